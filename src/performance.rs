/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::{
    algorithm::AlgorithmKind,
    network_condition::NetworkCondition,
    sample_history::SampleHistory,
    units::{DataRate, TimeDelta},
};

const SCORE_WINDOW: usize = 10;
const MIN_STABILITY_SAMPLES: usize = 3;
// Throughput at or above this saturates the throughput term.
const REFERENCE_BANDWIDTH: DataRate = DataRate::from_bytes_per_sec(1_000_000);
const LOSS_PENALTY_SCALE: f64 = 50.0;

const THROUGHPUT_WEIGHT: f64 = 0.5;
const LOSS_WEIGHT: f64 = 0.3;
const STABILITY_WEIGHT: f64 = 0.2;

/// What one algorithm has done for a session so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PerformanceRecord {
    // Completed active periods only; the live one is added by the report.
    #[serde(serialize_with = "serialize_seconds")]
    pub active_time: TimeDelta,
    pub switch_count: u32,
    // Score at the end of the last active period.
    pub score: f64,
}

fn serialize_seconds<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.seconds_float())
}

/// Score in [0, 1] of how well the path is being used right now. Half is
/// throughput relative to 1 MB/s, 30% loss and 20% RTT stability.
pub fn performance_score(history: &SampleHistory, loss_rate: f64, packets_sent: u64) -> f64 {
    if packets_sent == 0 {
        return 0.5;
    }

    let bandwidth = history.average_bandwidth(SCORE_WINDOW).unwrap_or_default();
    let throughput = (bandwidth / REFERENCE_BANDWIDTH).min(1.0);
    let loss_penalty = 1.0 - (loss_rate * LOSS_PENALTY_SCALE).min(1.0);
    let jitter = if history.len() < MIN_STABILITY_SAMPLES {
        TimeDelta::zero()
    } else {
        history.rtt_std_dev(SCORE_WINDOW)
    };
    let stability = 1.0 / (1.0 + jitter.ms_float());

    THROUGHPUT_WEIGHT * throughput + LOSS_WEIGHT * loss_penalty + STABILITY_WEIGHT * stability
}

/// Counters and per-algorithm records of one session.
#[derive(Clone, Debug, Serialize)]
pub struct PerformanceReport {
    pub algorithm: AlgorithmKind,
    pub condition: NetworkCondition,
    pub packets_sent: u64,
    pub packets_lost: u64,
    pub bytes_sent: i64,
    pub loss_rate: f64,
    pub algorithms: BTreeMap<AlgorithmKind, PerformanceRecord>,
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use test_trace::test;

    use super::*;
    use crate::sample_history::NetworkSample;

    fn push(history: &mut SampleHistory, rtt_ms: i64, bytes_per_sec: i64) {
        history.push(NetworkSample {
            rtt: TimeDelta::from_millis(rtt_ms),
            bandwidth: DataRate::from_bytes_per_sec(bytes_per_sec),
        });
    }

    #[test]
    fn nothing_sent_is_neutral() {
        let history = SampleHistory::new(50);
        assert_eq!(performance_score(&history, 0.0, 0), 0.5);
    }

    #[test]
    fn perfect_path_scores_one() {
        let mut history = SampleHistory::new(50);
        for _ in 0..10 {
            push(&mut history, 20, 5_000_000);
        }
        assert_relative_eq!(performance_score(&history, 0.0, 100), 1.0);
    }

    #[test]
    fn weighs_throughput_loss_and_stability() {
        let mut history = SampleHistory::new(50);
        // Half the reference bandwidth, RTTs 10 and 12 ms: std dev 1 ms.
        for rtt in [10, 12, 10, 12] {
            push(&mut history, rtt, 500_000);
        }
        let score = performance_score(&history, 0.01, 100);
        assert_relative_eq!(score, 0.5 * 0.5 + 0.3 * 0.5 + 0.2 * 0.5);
    }

    #[test]
    fn short_history_counts_as_stable() {
        let mut history = SampleHistory::new(50);
        push(&mut history, 10, 1_000_000);
        push(&mut history, 500, 1_000_000);
        assert_relative_eq!(performance_score(&history, 1.0, 100), 0.5 + 0.2);
    }

    #[test]
    fn active_time_serializes_as_seconds() {
        let record = PerformanceRecord {
            active_time: TimeDelta::from_millis(12_500),
            switch_count: 2,
            score: 0.25,
        };
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"active_time": 12.5, "switch_count": 2, "score": 0.25})
        );
    }
}
