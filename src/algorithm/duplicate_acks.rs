/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

// Triple duplicate ack, the classic loss signal.
pub(crate) const DUPLICATE_ACK_THRESHOLD: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AckKind {
    /// Acknowledges new data.
    New,
    /// Repeats the previous ack number. Carries the running count.
    Duplicate(u32),
    /// Older than the previous ack, reordered on the way back.
    Stale,
}

/// Tracks repeated acknowledgments of the same sequence number.
#[derive(Clone, Debug, Default)]
pub(crate) struct DuplicateAcks {
    last_ack: Option<u64>,
    count: u32,
}

impl DuplicateAcks {
    pub fn on_ack(&mut self, ack_num: u64) -> AckKind {
        match self.last_ack {
            Some(last_ack) if ack_num == last_ack => {
                self.count += 1;
                AckKind::Duplicate(self.count)
            }
            Some(last_ack) if ack_num < last_ack => AckKind::Stale,
            _ => {
                self.last_ack = Some(ack_num);
                self.count = 0;
                AckKind::New
            }
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}
