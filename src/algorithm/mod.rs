/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

//! The four congestion control algorithms and the uniform contract they share.

mod bbr;
mod cubic;
mod duplicate_acks;
mod reno;
mod tahoe;

pub use bbr::*;
pub use cubic::*;
pub use reno::*;
pub use tahoe::*;

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::{
    config::EngineConfig,
    error::Error,
    units::{DataRate, DataSize, TimeDelta, Timestamp},
};

// Shared by the window based algorithms.
pub(crate) const INITIAL_CWND: f64 = 1.0;
pub(crate) const INITIAL_SSTHRESH: f64 = 65535.0;
pub(crate) const MIN_CWND: f64 = 1.0;
pub(crate) const MIN_SSTHRESH: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmKind {
    Tahoe,
    Reno,
    Cubic,
    Bbr,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 4] = [Self::Tahoe, Self::Reno, Self::Cubic, Self::Bbr];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tahoe => "tahoe",
            Self::Reno => "reno",
            Self::Cubic => "cubic",
            Self::Bbr => "bbr",
        }
    }

    /// The kind of network each algorithm is suited for.
    pub const fn recommendation(&self) -> &'static str {
        match self {
            Self::Tahoe => "High loss or unstable networks",
            Self::Reno => "Congested networks with moderate loss rates",
            Self::Cubic => "High bandwidth networks with moderate latency",
            Self::Bbr => "Clean, low latency networks and high bandwidth-delay product paths",
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tahoe" => Ok(Self::Tahoe),
            "reno" => Ok(Self::Reno),
            "cubic" => Ok(Self::Cubic),
            "bbr" => Ok(Self::Bbr),
            _ => Err(Error::InvalidArgument(format!(
                "unknown congestion control algorithm: {s:?}"
            ))),
        }
    }
}

/// Phases of the window based algorithms (Tahoe, Reno and Cubic).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowPhase {
    SlowStart,
    CongestionAvoidance,
    /// Reno only.
    FastRecovery,
}

impl WindowPhase {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SlowStart => "slow_start",
            Self::CongestionAvoidance => "congestion_avoidance",
            Self::FastRecovery => "fast_recovery",
        }
    }
}

/// One acknowledgment, with whatever measurements came with it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AckSample {
    pub ack_num: u64,
    pub rtt: Option<TimeDelta>,
    pub delivered: Option<DataSize>,
    pub elapsed: Option<TimeDelta>,
}

impl AckSample {
    pub fn new(ack_num: u64) -> Self {
        Self {
            ack_num,
            ..Default::default()
        }
    }

    pub fn with_rtt(mut self, rtt: TimeDelta) -> Self {
        self.rtt = Some(rtt);
        self
    }

    pub fn with_delivery(mut self, delivered: DataSize, elapsed: TimeDelta) -> Self {
        self.delivered = Some(delivered);
        self.elapsed = Some(elapsed);
        self
    }

    /// The RTT, unless missing or non-positive.
    pub fn valid_rtt(&self) -> Option<TimeDelta> {
        self.rtt.filter(|rtt| *rtt > TimeDelta::zero())
    }

    /// The elapsed time of the delivery sample, unless missing or non-positive.
    pub fn valid_elapsed(&self) -> Option<TimeDelta> {
        self.elapsed.filter(|elapsed| *elapsed > TimeDelta::zero())
    }

    /// Delivery rate over the sample interval.
    pub fn delivery_rate(&self) -> Option<DataRate> {
        let elapsed = self.valid_elapsed()?;
        let delivered = self.delivered?;
        if delivered <= DataSize::zero() {
            return None;
        }
        Some(delivered / elapsed)
    }
}

/// The fields that survive a hot-swap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Window {
    pub cwnd: f64,
    pub ssthresh: f64,
}

pub trait CongestionAlgorithmInterface {
    fn on_ack(&mut self, ack: &AckSample, at_time: Timestamp);

    // Called when the sender detects a lost segment.
    fn on_loss(&mut self, at_time: Timestamp);

    // Called when the retransmission timer expires.
    fn on_timeout(&mut self, at_time: Timestamp) {
        self.on_loss(at_time)
    }

    /// Congestion window, in segments.
    fn cwnd(&self) -> f64;

    fn ssthresh(&self) -> f64;

    fn phase_name(&self) -> &'static str;

    /// Overwrite cwnd and ssthresh, clamped to this algorithm's floors.
    fn set_window(&mut self, window: Window);

    /// Only model based algorithms keep their own estimate.
    fn bandwidth_estimate(&self) -> Option<DataRate> {
        None
    }

    fn pacing_rate(&self) -> Option<DataRate> {
        None
    }

    fn window(&self) -> Window {
        Window {
            cwnd: self.cwnd(),
            ssthresh: self.ssthresh(),
        }
    }
}

/// The active algorithm of a session.
#[derive(Clone, Debug)]
pub enum AlgorithmState {
    Tahoe(Tahoe),
    Reno(Reno),
    Cubic(Cubic),
    Bbr(Bbr),
}

impl AlgorithmState {
    /// A fresh instance, in the algorithm's natural initial phase.
    pub fn new(kind: AlgorithmKind, config: &EngineConfig, at_time: Timestamp) -> Self {
        match kind {
            AlgorithmKind::Tahoe => Self::Tahoe(Tahoe::new()),
            AlgorithmKind::Reno => Self::Reno(Reno::new()),
            AlgorithmKind::Cubic => Self::Cubic(Cubic::new()),
            AlgorithmKind::Bbr => Self::Bbr(Bbr::new(config, at_time)),
        }
    }

    /// A fresh instance that inherits a window from the algorithm it replaces.
    pub fn with_window(
        kind: AlgorithmKind,
        window: Window,
        config: &EngineConfig,
        at_time: Timestamp,
    ) -> Self {
        let mut state = Self::new(kind, config, at_time);
        state.set_window(window);
        state
    }

    pub fn kind(&self) -> AlgorithmKind {
        match self {
            Self::Tahoe(_) => AlgorithmKind::Tahoe,
            Self::Reno(_) => AlgorithmKind::Reno,
            Self::Cubic(_) => AlgorithmKind::Cubic,
            Self::Bbr(_) => AlgorithmKind::Bbr,
        }
    }

    fn inner(&self) -> &dyn CongestionAlgorithmInterface {
        match self {
            Self::Tahoe(state) => state,
            Self::Reno(state) => state,
            Self::Cubic(state) => state,
            Self::Bbr(state) => state,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn CongestionAlgorithmInterface {
        match self {
            Self::Tahoe(state) => state,
            Self::Reno(state) => state,
            Self::Cubic(state) => state,
            Self::Bbr(state) => state,
        }
    }
}

impl CongestionAlgorithmInterface for AlgorithmState {
    fn on_ack(&mut self, ack: &AckSample, at_time: Timestamp) {
        self.inner_mut().on_ack(ack, at_time)
    }

    fn on_loss(&mut self, at_time: Timestamp) {
        self.inner_mut().on_loss(at_time)
    }

    fn on_timeout(&mut self, at_time: Timestamp) {
        self.inner_mut().on_timeout(at_time)
    }

    fn cwnd(&self) -> f64 {
        self.inner().cwnd()
    }

    fn ssthresh(&self) -> f64 {
        self.inner().ssthresh()
    }

    fn phase_name(&self) -> &'static str {
        self.inner().phase_name()
    }

    fn set_window(&mut self, window: Window) {
        self.inner_mut().set_window(window)
    }

    fn bandwidth_estimate(&self) -> Option<DataRate> {
        self.inner().bandwidth_estimate()
    }

    fn pacing_rate(&self) -> Option<DataRate> {
        self.inner().pacing_rate()
    }
}

// Slow start and congestion avoidance growth shared by Tahoe, Reno and Cubic.
// Returns true when slow start just ended.
pub(crate) fn grow_window(cwnd: &mut f64, ssthresh: f64, phase: &mut WindowPhase) -> bool {
    match phase {
        WindowPhase::SlowStart => {
            *cwnd += 1.0;
            if *cwnd >= ssthresh {
                *phase = WindowPhase::CongestionAvoidance;
                return true;
            }
        }
        WindowPhase::CongestionAvoidance => *cwnd += 1.0 / *cwnd,
        WindowPhase::FastRecovery => {}
    }
    false
}

pub(crate) fn clamp_window(window: Window, min_cwnd: f64) -> Window {
    Window {
        cwnd: window.cwnd.max(min_cwnd),
        ssthresh: window.ssthresh.max(MIN_SSTHRESH),
    }
}
