/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::{
    algorithm::{AckSample, AlgorithmKind, AlgorithmState, CongestionAlgorithmInterface},
    config::EngineConfig,
    network_condition::{classify, NetworkCondition},
    performance::{performance_score, PerformanceRecord, PerformanceReport},
    sample_history::{NetworkSample, SampleHistory},
    units::{DataRate, DataSize, TimeDelta, Timestamp},
};

// Samples averaged for the window based bandwidth estimate.
const BANDWIDTH_ESTIMATE_WINDOW: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchReason {
    Condition(NetworkCondition),
    Manual,
}

impl fmt::Display for SwitchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Condition(condition) => write!(f, "network condition: {condition}"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwitchEvent {
    pub from: AlgorithmKind,
    pub to: AlgorithmKind,
    pub reason: SwitchReason,
    pub at_time: Timestamp,
}

/// Point-in-time view of a session. Rates are in bytes per second.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub algorithm: AlgorithmKind,
    pub phase: &'static str,
    pub cwnd: f64,
    pub ssthresh: f64,
    pub condition: NetworkCondition,
    pub loss_rate: f64,
    pub bandwidth_estimate: f64,
    pub pacing_rate: f64,
    pub time_since_switch: f64,
}

/// Runs one congestion control algorithm at a time and replaces it whenever
/// the observed network condition favours another one.
///
/// Automatic switches are at least `switch_cooldown` apart. A switch keeps
/// cwnd and ssthresh; everything else about the new algorithm starts fresh.
#[derive(Clone, Debug)]
pub struct AdaptiveController {
    config: EngineConfig,
    algorithm: AlgorithmState,
    history: SampleHistory,
    performance: BTreeMap<AlgorithmKind, PerformanceRecord>,
    condition: NetworkCondition,
    last_switch_time: Timestamp,

    packets_sent: u64,
    packets_lost: u64,
    bytes_sent: DataSize,
    latest_rtt: Option<TimeDelta>,
}

impl AdaptiveController {
    pub fn new(config: &EngineConfig, at_time: Timestamp) -> Self {
        Self {
            algorithm: AlgorithmState::new(config.initial_algorithm, config, at_time),
            history: SampleHistory::new(config.history_capacity),
            performance: AlgorithmKind::ALL
                .into_iter()
                .map(|kind| (kind, PerformanceRecord::default()))
                .collect(),
            condition: NetworkCondition::Good,
            last_switch_time: at_time,
            packets_sent: 0,
            packets_lost: 0,
            bytes_sent: DataSize::zero(),
            latest_rtt: None,
            config: config.clone(),
        }
    }

    /// Processes one acknowledgment. Returns the switch it caused, if any.
    ///
    /// Only acks carrying both an RTT and a delivery rate feed the history and
    /// can lead to a switch. Every ack reaches the active algorithm.
    pub fn feed_ack(&mut self, ack: &AckSample, at_time: Timestamp) -> Option<SwitchEvent> {
        let rtt = ack.valid_rtt();
        let sample = rtt
            .zip(ack.delivery_rate())
            .map(|(rtt, bandwidth)| NetworkSample { rtt, bandwidth });
        if let Some(sample) = sample {
            self.history.push(sample);
        }
        if rtt.is_some() {
            self.latest_rtt = rtt;
        }

        self.algorithm.on_ack(ack, at_time);

        if sample.is_none() {
            return None;
        }
        self.update_score();
        self.reclassify();

        let target = self.condition.preferred_algorithm();
        if !self.should_switch(target, at_time) {
            return None;
        }
        Some(self.hot_swap(target, SwitchReason::Condition(self.condition), at_time))
    }

    /// Counts a lost packet and reclassifies the path. Switching is left to the
    /// next measured ack.
    pub fn feed_loss(&mut self, at_time: Timestamp) {
        self.packets_lost += 1;
        self.algorithm.on_loss(at_time);
        self.reclassify();
    }

    pub fn on_data_sent(&mut self, size: DataSize) {
        self.packets_sent += 1;
        self.bytes_sent += size;
        self.reclassify();
    }

    /// Switches to `target` regardless of the cooldown. No-op if it is already active.
    pub fn manual_switch(
        &mut self,
        target: AlgorithmKind,
        at_time: Timestamp,
    ) -> Option<SwitchEvent> {
        if target == self.algorithm.kind() {
            return None;
        }
        Some(self.hot_swap(target, SwitchReason::Manual, at_time))
    }

    /// The recorded scores are not consulted: once the cooldown is over any
    /// other algorithm is worth switching to.
    pub fn should_switch(&self, target: AlgorithmKind, at_time: Timestamp) -> bool {
        if target == self.algorithm.kind() {
            return false;
        }
        at_time - self.last_switch_time >= self.config.switch_cooldown
    }

    fn hot_swap(
        &mut self,
        target: AlgorithmKind,
        reason: SwitchReason,
        at_time: Timestamp,
    ) -> SwitchEvent {
        let from = self.algorithm.kind();
        let window = self.algorithm.window();
        self.algorithm = AlgorithmState::with_window(target, window, &self.config, at_time);

        let active = (at_time - self.last_switch_time).max(TimeDelta::zero());
        self.record_mut(from).active_time += active;
        self.record_mut(target).switch_count += 1;
        self.last_switch_time = at_time;

        tracing::info!(
            %from,
            to = %target,
            %reason,
            cwnd = window.cwnd,
            ssthresh = window.ssthresh,
            "congestion control algorithm switched"
        );
        SwitchEvent {
            from,
            to: target,
            reason,
            at_time,
        }
    }

    // The loss rate moves with every counter, so the condition is kept in step with it.
    fn reclassify(&mut self) {
        self.condition = classify(&self.history, self.loss_rate(), &self.config.classifier);
    }

    fn update_score(&mut self) {
        let score = performance_score(&self.history, self.loss_rate(), self.packets_sent);
        let kind = self.algorithm.kind();
        self.record_mut(kind).score = score;
    }

    fn record_mut(&mut self, kind: AlgorithmKind) -> &mut PerformanceRecord {
        self.performance.entry(kind).or_default()
    }

    pub fn algorithm(&self) -> &AlgorithmState {
        &self.algorithm
    }

    pub fn algorithm_kind(&self) -> AlgorithmKind {
        self.algorithm.kind()
    }

    pub fn condition(&self) -> NetworkCondition {
        self.condition
    }

    pub fn history(&self) -> &SampleHistory {
        &self.history
    }

    pub fn last_switch_time(&self) -> Timestamp {
        self.last_switch_time
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn packets_lost(&self) -> u64 {
        self.packets_lost
    }

    pub fn performance_record(&self, kind: AlgorithmKind) -> PerformanceRecord {
        self.performance.get(&kind).copied().unwrap_or_default()
    }

    pub fn loss_rate(&self) -> f64 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        self.packets_lost as f64 / self.packets_sent as f64
    }

    /// BBR's own estimate, otherwise the recent average of the history.
    pub fn bandwidth_estimate(&self) -> Option<DataRate> {
        self.algorithm
            .bandwidth_estimate()
            .or_else(|| self.history.average_bandwidth(BANDWIDTH_ESTIMATE_WINDOW))
    }

    /// BBR's own pacing rate, otherwise one window per RTT.
    pub fn pacing_rate(&self) -> Option<DataRate> {
        self.algorithm.pacing_rate().or_else(|| {
            let rtt = self.latest_rtt?;
            Some((self.config.segment_size * self.algorithm.cwnd()) / rtt)
        })
    }

    pub fn snapshot(&self, at_time: Timestamp) -> Snapshot {
        let bytes_per_sec = |rate: Option<DataRate>| {
            rate.filter(|rate| rate.is_finite())
                .map_or(0.0, |rate| rate.bytes_per_sec_float())
        };
        Snapshot {
            algorithm: self.algorithm.kind(),
            phase: self.algorithm.phase_name(),
            cwnd: self.algorithm.cwnd(),
            ssthresh: self.algorithm.ssthresh(),
            condition: self.condition,
            loss_rate: self.loss_rate(),
            bandwidth_estimate: bytes_per_sec(self.bandwidth_estimate()),
            pacing_rate: bytes_per_sec(self.pacing_rate()),
            time_since_switch: (at_time - self.last_switch_time).seconds_float().max(0.0),
        }
    }

    /// Records include the time the active algorithm has spent since its last switch.
    pub fn performance_report(&self, at_time: Timestamp) -> PerformanceReport {
        let mut algorithms = self.performance.clone();
        let live = (at_time - self.last_switch_time).max(TimeDelta::zero());
        algorithms.entry(self.algorithm.kind()).or_default().active_time += live;

        PerformanceReport {
            algorithm: self.algorithm.kind(),
            condition: self.condition,
            packets_sent: self.packets_sent,
            packets_lost: self.packets_lost,
            bytes_sent: self.bytes_sent.bytes(),
            loss_rate: self.loss_rate(),
            algorithms,
        }
    }
}
