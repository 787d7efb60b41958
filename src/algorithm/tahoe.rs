/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

use crate::units::Timestamp;

use super::{
    clamp_window,
    duplicate_acks::{AckKind, DuplicateAcks, DUPLICATE_ACK_THRESHOLD},
    grow_window, AckSample, CongestionAlgorithmInterface, Window, WindowPhase, INITIAL_CWND,
    INITIAL_SSTHRESH, MIN_CWND, MIN_SSTHRESH,
};

// TCP Tahoe: slow start, congestion avoidance, and a full reset to one segment on
// any loss signal. A triple duplicate ack is treated as a loss (fast retransmit)
// without the fast recovery that Reno added.
#[derive(Clone, Debug)]
pub struct Tahoe {
    cwnd: f64,
    ssthresh: f64,
    phase: WindowPhase,
    duplicate_acks: DuplicateAcks,
}

impl Default for Tahoe {
    fn default() -> Self {
        Self::new()
    }
}

impl Tahoe {
    pub fn new() -> Self {
        Self {
            cwnd: INITIAL_CWND,
            ssthresh: INITIAL_SSTHRESH,
            phase: WindowPhase::SlowStart,
            duplicate_acks: DuplicateAcks::default(),
        }
    }

    pub fn phase(&self) -> WindowPhase {
        self.phase
    }

    pub fn duplicate_acks(&self) -> u32 {
        self.duplicate_acks.count()
    }

    fn collapse_window(&mut self) {
        self.ssthresh = (self.cwnd / 2.0).max(MIN_SSTHRESH);
        self.cwnd = MIN_CWND;
        self.phase = WindowPhase::SlowStart;
        self.duplicate_acks.reset();
    }
}

impl CongestionAlgorithmInterface for Tahoe {
    fn on_ack(&mut self, ack: &AckSample, _at_time: Timestamp) {
        match self.duplicate_acks.on_ack(ack.ack_num) {
            AckKind::New => {
                grow_window(&mut self.cwnd, self.ssthresh, &mut self.phase);
            }
            AckKind::Duplicate(DUPLICATE_ACK_THRESHOLD) => {
                tracing::debug!(ack_num = ack.ack_num, "tahoe fast retransmit");
                self.collapse_window();
            }
            AckKind::Duplicate(_) | AckKind::Stale => {}
        }
    }

    fn on_loss(&mut self, _at_time: Timestamp) {
        self.collapse_window();
    }

    fn cwnd(&self) -> f64 {
        self.cwnd
    }

    fn ssthresh(&self) -> f64 {
        self.ssthresh
    }

    fn phase_name(&self) -> &'static str {
        self.phase.name()
    }

    fn set_window(&mut self, window: Window) {
        let window = clamp_window(window, MIN_CWND);
        self.cwnd = window.cwnd;
        self.ssthresh = window.ssthresh;
    }
}
