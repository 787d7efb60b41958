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

// CUBIC grows the window along a cubic curve anchored at the window size where
// the last loss happened (wmax), so it recovers quickly towards that point and
// then probes cautiously beyond it.
#[derive(Clone, Debug)]
pub struct Cubic {
    cwnd: f64,
    ssthresh: f64,
    phase: WindowPhase,
    duplicate_acks: DuplicateAcks,
    // Window size just before the last reduction.
    wmax: f64,
    // Time, in seconds, the curve takes to climb back to wmax (K).
    origin_point: f64,
    epoch_start: Option<Timestamp>,
}

impl Default for Cubic {
    fn default() -> Self {
        Self::new()
    }
}

impl Cubic {
    /// Scaling constant of the cubic function.
    pub const C: f64 = 0.4;
    /// Multiplicative decrease factor.
    pub const BETA: f64 = 0.7;

    pub fn new() -> Self {
        Self {
            cwnd: INITIAL_CWND,
            ssthresh: INITIAL_SSTHRESH,
            phase: WindowPhase::SlowStart,
            duplicate_acks: DuplicateAcks::default(),
            wmax: 0.0,
            origin_point: 0.0,
            epoch_start: None,
        }
    }

    pub fn phase(&self) -> WindowPhase {
        self.phase
    }

    pub fn wmax(&self) -> f64 {
        self.wmax
    }

    pub fn origin_point(&self) -> f64 {
        self.origin_point
    }

    pub fn epoch_start(&self) -> Option<Timestamp> {
        self.epoch_start
    }

    /// W(t) = C * (t - K)^3 + wmax, with t in seconds since the epoch started.
    pub fn target_window(&self, t: f64) -> f64 {
        Self::C * (t - self.origin_point).powi(3) + self.wmax
    }

    fn congestion_avoidance(&mut self, at_time: Timestamp) {
        let epoch_start = *self.epoch_start.get_or_insert(at_time);
        let t = (at_time - epoch_start).seconds_float().max(0.0);
        let target = self.target_window(t);
        if target > self.cwnd {
            self.cwnd = target.min(self.cwnd + 1.0 / self.cwnd);
        } else {
            self.cwnd += 1.0 / self.cwnd;
        }
    }

    fn reduce_window(&mut self, at_time: Timestamp) {
        self.wmax = self.cwnd;
        self.cwnd = (self.cwnd * Self::BETA).max(MIN_CWND);
        self.ssthresh = self.cwnd.max(MIN_SSTHRESH);
        self.phase = WindowPhase::CongestionAvoidance;
        self.epoch_start = Some(at_time);
        self.origin_point = (self.wmax * (1.0 - Self::BETA) / Self::C).cbrt();
        self.duplicate_acks.reset();
        tracing::debug!(
            wmax = self.wmax,
            cwnd = self.cwnd,
            k = self.origin_point,
            "cubic epoch restarted"
        );
    }
}

impl CongestionAlgorithmInterface for Cubic {
    fn on_ack(&mut self, ack: &AckSample, at_time: Timestamp) {
        match self.duplicate_acks.on_ack(ack.ack_num) {
            AckKind::New => match self.phase {
                WindowPhase::SlowStart => {
                    if grow_window(&mut self.cwnd, self.ssthresh, &mut self.phase) {
                        self.epoch_start = Some(at_time);
                    }
                }
                _ => self.congestion_avoidance(at_time),
            },
            AckKind::Duplicate(DUPLICATE_ACK_THRESHOLD) => self.reduce_window(at_time),
            AckKind::Duplicate(_) | AckKind::Stale => {}
        }
    }

    fn on_loss(&mut self, at_time: Timestamp) {
        self.reduce_window(at_time);
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
