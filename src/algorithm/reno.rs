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

// TCP Reno: Tahoe plus fast recovery. The third duplicate ack halves the window
// instead of collapsing it, and every further duplicate inflates it by one
// segment until an ack beyond the recovery point arrives.
#[derive(Clone, Debug)]
pub struct Reno {
    cwnd: f64,
    ssthresh: f64,
    phase: WindowPhase,
    duplicate_acks: DuplicateAcks,
    // Highest ack number seen when fast recovery started.
    recover_ack: u64,
}

impl Default for Reno {
    fn default() -> Self {
        Self::new()
    }
}

impl Reno {
    pub fn new() -> Self {
        Self {
            cwnd: INITIAL_CWND,
            ssthresh: INITIAL_SSTHRESH,
            phase: WindowPhase::SlowStart,
            duplicate_acks: DuplicateAcks::default(),
            recover_ack: 0,
        }
    }

    pub fn phase(&self) -> WindowPhase {
        self.phase
    }

    pub fn recover_ack(&self) -> u64 {
        self.recover_ack
    }

    pub fn duplicate_acks(&self) -> u32 {
        self.duplicate_acks.count()
    }

    fn enter_fast_recovery(&mut self, ack_num: u64) {
        self.ssthresh = (self.cwnd / 2.0).max(MIN_SSTHRESH);
        self.cwnd = self.ssthresh + 3.0;
        self.phase = WindowPhase::FastRecovery;
        self.recover_ack = ack_num;
        tracing::debug!(ack_num, cwnd = self.cwnd, "reno entered fast recovery");
    }

    fn exit_fast_recovery(&mut self) {
        self.cwnd = self.ssthresh;
        self.phase = WindowPhase::CongestionAvoidance;
        self.duplicate_acks.reset();
        tracing::debug!(cwnd = self.cwnd, "reno left fast recovery");
    }

    fn on_recovery_ack(&mut self, ack_num: u64) {
        if ack_num > self.recover_ack {
            self.duplicate_acks.on_ack(ack_num);
            self.exit_fast_recovery();
            return;
        }
        if let AckKind::Duplicate(_) = self.duplicate_acks.on_ack(ack_num) {
            self.cwnd += 1.0;
        }
    }
}

impl CongestionAlgorithmInterface for Reno {
    fn on_ack(&mut self, ack: &AckSample, _at_time: Timestamp) {
        if self.phase == WindowPhase::FastRecovery {
            self.on_recovery_ack(ack.ack_num);
            return;
        }

        match self.duplicate_acks.on_ack(ack.ack_num) {
            AckKind::New => {
                grow_window(&mut self.cwnd, self.ssthresh, &mut self.phase);
            }
            AckKind::Duplicate(DUPLICATE_ACK_THRESHOLD) => self.enter_fast_recovery(ack.ack_num),
            AckKind::Duplicate(_) | AckKind::Stale => {}
        }
    }

    // An explicit loss report means the retransmission timer fired, so fall back
    // to slow start as Tahoe would.
    fn on_loss(&mut self, _at_time: Timestamp) {
        self.ssthresh = (self.cwnd / 2.0).max(MIN_SSTHRESH);
        self.cwnd = MIN_CWND;
        self.phase = WindowPhase::SlowStart;
        self.duplicate_acks.reset();
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

#[cfg(test)]
mod test {
    use test_trace::test;

    use super::*;

    fn ack(reno: &mut Reno, ack_num: u64) {
        reno.on_ack(&AckSample::new(ack_num), Timestamp::zero());
    }

    fn reno_with_cwnd(cwnd: f64) -> Reno {
        let mut reno = Reno::new();
        reno.set_window(Window {
            cwnd,
            ssthresh: 1000.0,
        });
        reno
    }

    #[test]
    fn third_duplicate_ack_enters_fast_recovery() {
        for cwnd in [2.0, 5.0, 16.0, 40.0] {
            let mut reno = reno_with_cwnd(cwnd);
            ack(&mut reno, 100);
            let c = reno.cwnd();
            ack(&mut reno, 100);
            ack(&mut reno, 100);
            assert_eq!(reno.cwnd(), c);

            ack(&mut reno, 100);
            let ssthresh = (c / 2.0).max(2.0);
            assert_eq!(reno.ssthresh(), ssthresh);
            assert_eq!(reno.cwnd(), ssthresh + 3.0);
            assert_eq!(reno.phase(), WindowPhase::FastRecovery);
            assert_eq!(reno.recover_ack(), 100);
        }
    }

    #[test]
    fn fast_recovery_inflates_and_deflates() {
        let mut reno = reno_with_cwnd(19.0);
        for _ in 0..4 {
            ack(&mut reno, 7);
        }
        // The first ack grew cwnd to 20 before the duplicates.
        assert_eq!(reno.ssthresh(), 10.0);
        assert_eq!(reno.cwnd(), 13.0);

        for expected in [14.0, 15.0, 16.0] {
            ack(&mut reno, 7);
            assert_eq!(reno.cwnd(), expected);
            assert_eq!(reno.phase_name(), "fast_recovery");
        }

        // Stale acks are not duplicates.
        ack(&mut reno, 3);
        assert_eq!(reno.cwnd(), 16.0);

        ack(&mut reno, 8);
        assert_eq!(reno.cwnd(), 10.0);
        assert_eq!(reno.phase_name(), "congestion_avoidance");
        assert_eq!(reno.duplicate_acks(), 0);
    }

    #[test]
    fn new_ack_after_recovery_grows_additively() {
        let mut reno = reno_with_cwnd(19.0);
        for _ in 0..4 {
            ack(&mut reno, 7);
        }
        ack(&mut reno, 8);
        ack(&mut reno, 9);
        assert_eq!(reno.cwnd(), 10.0 + 1.0 / 10.0);
    }

    #[test]
    fn loss_falls_back_to_slow_start() {
        let mut reno = reno_with_cwnd(30.0);
        reno.on_loss(Timestamp::zero());
        assert_eq!(reno.ssthresh(), 15.0);
        assert_eq!(reno.cwnd(), 1.0);
        assert_eq!(reno.phase(), WindowPhase::SlowStart);
    }
}
