/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

use crate::{
    config::EngineConfig,
    units::{DataRate, DataSize, TimeDelta, Timestamp},
};

use super::{clamp_window, AckSample, CongestionAlgorithmInterface, Window, INITIAL_SSTHRESH};

#[derive(Clone, Debug)]
pub struct BbrConfig {
    pub high_gain: f64,                   // Startup pacing gain, 2/ln(2)
    pub cwnd_gain: f64,                   // Applied to the BDP outside ProbeRTT
    pub gain_cycle: [f64; 8],             // ProbeBW pacing gains
    pub probe_rtt_duration: TimeDelta,    // Time spent in ProbeRTT
    pub min_rtt_window: TimeDelta,        // Min RTT expiry
    pub full_bandwidth_growth: f64,       // Growth that still counts as Startup progress
    pub full_bandwidth_rounds: u32,       // Rounds without growth before Drain
    pub min_cwnd: f64,                    // Window floor, in segments
    pub min_pacing_rate: DataRate,        // Pacing floor
    pub initial_cwnd: f64,                // Window before any estimate exists
    pub initial_bandwidth: DataRate,      // Estimate before any delivery sample
    pub sample_expiry: TimeDelta,         // Samples spanning longer always replace the estimate
}

impl Default for BbrConfig {
    fn default() -> Self {
        Self {
            high_gain: 2.885,
            cwnd_gain: 2.0,
            gain_cycle: [1.25, 0.75, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            probe_rtt_duration: TimeDelta::from_millis(200),
            min_rtt_window: TimeDelta::from_seconds(10),
            full_bandwidth_growth: 1.25,
            full_bandwidth_rounds: 3,
            min_cwnd: 4.0,
            min_pacing_rate: DataRate::from_bytes_per_sec(1000),
            initial_cwnd: 10.0,
            initial_bandwidth: DataRate::from_bytes_per_sec(1_000_000),
            sample_expiry: TimeDelta::from_seconds(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BbrState {
    /// Exponential search for the bottleneck bandwidth.
    Startup,
    /// Pace below the estimate to empty the queue Startup built.
    Drain,
    /// Steady state, cycling the pacing gain around 1.0.
    ProbeBandwidth,
    /// Shrink the window to re-measure the propagation delay.
    ProbeRtt,
}

impl BbrState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Startup => "STARTUP",
            Self::Drain => "DRAIN",
            Self::ProbeBandwidth => "PROBE_BW",
            Self::ProbeRtt => "PROBE_RTT",
        }
    }
}

// Bottleneck Bandwidth and Round-trip propagation time.
//
// BBR builds a model of the path from delivery rate and RTT samples and sizes
// both its window and its pacing rate from the bandwidth-delay product. Loss is
// not a congestion signal here. All timers are evaluated lazily against the
// `at_time` of the next ack.
#[derive(Clone, Debug)]
pub struct Bbr {
    config: BbrConfig,
    segment_size: DataSize,

    state: BbrState,
    cwnd: f64,
    ssthresh: f64,
    prior_cwnd: f64,

    bandwidth_estimate: DataRate,
    pacing_gain: f64,
    pacing_rate: DataRate,

    // Plus infinity until the first RTT sample.
    min_rtt: TimeDelta,
    min_rtt_stamp: Timestamp,

    cycle_index: usize,
    cycle_stamp: Timestamp,

    full_bandwidth: DataRate,
    full_bandwidth_count: u32,
    full_bandwidth_reached: bool,

    probe_rtt_deadline: Option<Timestamp>,
}

impl Bbr {
    pub fn new(config: &EngineConfig, at_time: Timestamp) -> Self {
        let bbr = config.bbr.clone();
        let bandwidth_estimate = bbr.initial_bandwidth;
        Self {
            segment_size: config.segment_size,
            state: BbrState::Startup,
            cwnd: bbr.initial_cwnd.max(bbr.min_cwnd),
            ssthresh: INITIAL_SSTHRESH,
            prior_cwnd: 0.0,
            bandwidth_estimate,
            pacing_gain: bbr.high_gain,
            pacing_rate: (bandwidth_estimate * bbr.high_gain).max(bbr.min_pacing_rate),
            min_rtt: TimeDelta::plus_infinity(),
            // The RTT filter starts fresh, otherwise the first ack would see it as expired.
            min_rtt_stamp: at_time,
            cycle_index: 0,
            cycle_stamp: at_time,
            full_bandwidth: DataRate::zero(),
            full_bandwidth_count: 0,
            full_bandwidth_reached: false,
            probe_rtt_deadline: None,
            config: bbr,
        }
    }

    pub fn state(&self) -> BbrState {
        self.state
    }

    pub fn min_rtt(&self) -> TimeDelta {
        self.min_rtt
    }

    pub fn min_rtt_stamp(&self) -> Timestamp {
        self.min_rtt_stamp
    }

    pub fn pacing_gain(&self) -> f64 {
        self.pacing_gain
    }

    pub fn cycle_index(&self) -> usize {
        self.cycle_index
    }

    pub fn full_bandwidth_reached(&self) -> bool {
        self.full_bandwidth_reached
    }

    pub fn probe_rtt_deadline(&self) -> Option<Timestamp> {
        self.probe_rtt_deadline
    }

    /// Bandwidth-delay product in segments. Infinite until an RTT sample arrives.
    pub fn bdp(&self) -> f64 {
        let bdp: DataSize = self.bandwidth_estimate * self.min_rtt;
        bdp / self.segment_size
    }

    fn update_bandwidth(&mut self, delivered: DataSize, elapsed: TimeDelta) {
        let sample = delivered / elapsed;
        if sample > self.bandwidth_estimate || elapsed > self.config.sample_expiry {
            self.bandwidth_estimate = sample;
        }
    }

    fn update_min_rtt(&mut self, rtt: TimeDelta, at_time: Timestamp) {
        if rtt < self.min_rtt || at_time - self.min_rtt_stamp > self.config.min_rtt_window {
            self.min_rtt = rtt;
            self.min_rtt_stamp = at_time;
        }
    }

    // One evaluation round per ack. Startup is over once the estimate has failed
    // to grow by `full_bandwidth_growth` for `full_bandwidth_rounds` rounds.
    fn check_full_bandwidth(&mut self) -> bool {
        if self.full_bandwidth_reached {
            return true;
        }

        if self.bandwidth_estimate >= self.full_bandwidth * self.config.full_bandwidth_growth {
            self.full_bandwidth = self.bandwidth_estimate;
            self.full_bandwidth_count = 0;
        } else {
            self.full_bandwidth_count += 1;
        }

        if self.full_bandwidth_count >= self.config.full_bandwidth_rounds {
            self.full_bandwidth_reached = true;
        }
        self.full_bandwidth_reached
    }

    fn enter_drain(&mut self) {
        self.state = BbrState::Drain;
        self.pacing_gain = 1.0 / self.config.high_gain;
        tracing::debug!(bandwidth = ?self.bandwidth_estimate, "bbr startup done, draining");
    }

    fn enter_probe_bandwidth(&mut self, pacing_gain: f64, at_time: Timestamp) {
        self.state = BbrState::ProbeBandwidth;
        self.cycle_index = 0;
        self.pacing_gain = pacing_gain;
        self.cycle_stamp = at_time;
    }

    // A phase lasts one min RTT, which never elapses while the min RTT is unknown.
    fn advance_cycle_phase(&mut self, at_time: Timestamp) {
        if at_time - self.cycle_stamp > self.min_rtt {
            self.cycle_index = (self.cycle_index + 1) % self.config.gain_cycle.len();
            self.pacing_gain = self.config.gain_cycle[self.cycle_index];
            self.cycle_stamp = at_time;
        }
    }

    fn check_probe_rtt(&mut self, at_time: Timestamp) {
        if self.state != BbrState::ProbeRtt
            && at_time - self.min_rtt_stamp > self.config.min_rtt_window
        {
            tracing::debug!(from = self.state.name(), "bbr min rtt expired, probing rtt");
            self.state = BbrState::ProbeRtt;
            self.pacing_gain = 1.0;
            self.prior_cwnd = self.cwnd;
            self.probe_rtt_deadline = Some(at_time + self.config.probe_rtt_duration);
        }
    }

    fn handle_probe_rtt(&mut self, at_time: Timestamp) {
        let Some(deadline) = self.probe_rtt_deadline else {
            return;
        };
        if at_time < deadline {
            return;
        }

        self.min_rtt_stamp = at_time;
        if self.prior_cwnd > 0.0 {
            self.cwnd = self.cwnd.max(self.prior_cwnd);
        }
        self.probe_rtt_deadline = None;
        self.enter_probe_bandwidth(self.config.gain_cycle[0], at_time);
        tracing::debug!(cwnd = self.cwnd, "bbr probe rtt done");
    }

    fn set_pacing_rate(&mut self) {
        self.pacing_rate =
            (self.bandwidth_estimate * self.pacing_gain).max(self.config.min_pacing_rate);
    }

    fn set_cwnd(&mut self) {
        let min_cwnd = self.config.min_cwnd;
        if self.min_rtt.is_infinite() {
            self.cwnd = if self.state == BbrState::ProbeRtt {
                min_cwnd
            } else {
                self.cwnd.max(min_cwnd)
            };
            return;
        }

        let bdp = self.bdp();
        self.cwnd = if self.state == BbrState::ProbeRtt {
            bdp.max(min_cwnd)
        } else {
            (bdp * self.config.cwnd_gain).max(min_cwnd)
        };
    }
}

impl CongestionAlgorithmInterface for Bbr {
    fn on_ack(&mut self, ack: &AckSample, at_time: Timestamp) {
        if let Some(rtt) = ack.valid_rtt() {
            self.update_min_rtt(rtt, at_time);
        }
        // An interval without a byte count delivered nothing. Over a long enough
        // interval that zero rate replaces the estimate like any other sample.
        if let Some(elapsed) = ack.valid_elapsed() {
            self.update_bandwidth(ack.delivered.unwrap_or_default(), elapsed);
        }

        match self.state {
            BbrState::Startup => {
                self.pacing_gain = self.config.high_gain;
                if self.check_full_bandwidth() {
                    self.enter_drain();
                }
            }
            BbrState::Drain => {
                if self.cwnd <= self.bdp() {
                    self.enter_probe_bandwidth(1.0, at_time);
                    tracing::debug!(cwnd = self.cwnd, "bbr queue drained");
                }
            }
            BbrState::ProbeBandwidth => self.advance_cycle_phase(at_time),
            BbrState::ProbeRtt => {}
        }

        self.check_probe_rtt(at_time);
        if self.state == BbrState::ProbeRtt {
            self.handle_probe_rtt(at_time);
        }

        self.set_pacing_rate();
        self.set_cwnd();
    }

    // BBR does not back off on an isolated loss; the model already accounts for it.
    fn on_loss(&mut self, _at_time: Timestamp) {}

    fn cwnd(&self) -> f64 {
        self.cwnd
    }

    fn ssthresh(&self) -> f64 {
        self.ssthresh
    }

    fn phase_name(&self) -> &'static str {
        self.state.name()
    }

    fn set_window(&mut self, window: Window) {
        let window = clamp_window(window, self.config.min_cwnd);
        self.cwnd = window.cwnd;
        self.ssthresh = window.ssthresh;
    }

    fn bandwidth_estimate(&self) -> Option<DataRate> {
        Some(self.bandwidth_estimate)
    }

    fn pacing_rate(&self) -> Option<DataRate> {
        Some(self.pacing_rate)
    }
}
