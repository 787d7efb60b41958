/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

use std::fmt;

use serde::Serialize;

use crate::{
    algorithm::AlgorithmKind,
    sample_history::SampleHistory,
    units::{DataRate, TimeDelta},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum NetworkCondition {
    /// Low latency and almost no loss.
    #[serde(rename = "excellent")]
    Excellent,
    #[serde(rename = "good")]
    Good,
    /// High latency on a path that is not particularly fast.
    #[serde(rename = "congested")]
    Congested,
    #[serde(rename = "lossy")]
    Lossy,
    /// A long fat network: high latency and high bandwidth.
    #[serde(rename = "high_bw")]
    HighBandwidthDelay,
}

impl NetworkCondition {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Congested => "congested",
            Self::Lossy => "lossy",
            Self::HighBandwidthDelay => "high_bw",
        }
    }

    pub const fn preferred_algorithm(&self) -> AlgorithmKind {
        match self {
            Self::Excellent => AlgorithmKind::Bbr,
            Self::Good => AlgorithmKind::Cubic,
            Self::Congested => AlgorithmKind::Reno,
            Self::Lossy => AlgorithmKind::Tahoe,
            Self::HighBandwidthDelay => AlgorithmKind::Cubic,
        }
    }
}

impl fmt::Display for NetworkCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub min_samples: usize,         // Below this the signal is too thin, report Good
    pub rtt_window: usize,          // Samples averaged for the RTT
    pub bandwidth_window: usize,    // Samples averaged for the bandwidth
    pub high_rtt: TimeDelta,
    pub excellent_rtt: TimeDelta,
    pub high_loss: f64,
    pub low_loss: f64,
    pub high_bandwidth: DataRate,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_samples: 5,
            rtt_window: 10,
            bandwidth_window: 5,
            high_rtt: TimeDelta::from_millis(100),
            excellent_rtt: TimeDelta::from_millis(20),
            high_loss: 0.02,
            low_loss: 0.001,
            high_bandwidth: DataRate::from_bytes_per_sec(10 * 1024 * 1024),
        }
    }
}

/// Labels the path from the recent history and the session's loss rate.
/// The first matching rule wins.
pub fn classify(
    history: &SampleHistory,
    loss_rate: f64,
    config: &ClassifierConfig,
) -> NetworkCondition {
    if history.len() < config.min_samples {
        return NetworkCondition::Good;
    }
    let Some(rtt) = history.average_rtt(config.rtt_window) else {
        return NetworkCondition::Good;
    };
    let bandwidth = history
        .average_bandwidth(config.bandwidth_window)
        .unwrap_or_default();

    if loss_rate > config.high_loss {
        NetworkCondition::Lossy
    } else if rtt > config.high_rtt {
        if bandwidth > config.high_bandwidth {
            NetworkCondition::HighBandwidthDelay
        } else {
            NetworkCondition::Congested
        }
    } else if rtt < config.excellent_rtt && loss_rate < config.low_loss {
        NetworkCondition::Excellent
    } else {
        NetworkCondition::Good
    }
}
