/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

use std::collections::VecDeque;

use crate::units::{DataRate, TimeDelta};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetworkSample {
    pub rtt: TimeDelta,
    pub bandwidth: DataRate,
}

/// The most recent RTT/bandwidth pairs of a session, oldest evicted first.
#[derive(Clone, Debug)]
pub struct SampleHistory {
    capacity: usize,
    samples: VecDeque<NetworkSample>,
}

impl SampleHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: NetworkSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&NetworkSample> {
        self.samples.back()
    }

    /// The last `count` samples, oldest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &NetworkSample> {
        self.samples
            .iter()
            .skip(self.samples.len().saturating_sub(count))
    }

    /// Mean RTT over the last `count` samples, None if there are none.
    pub fn average_rtt(&self, count: usize) -> Option<TimeDelta> {
        let (sum, n) = self
            .recent(count)
            .fold((0.0, 0), |(sum, n), s| (sum + s.rtt.us_float(), n + 1));
        (n > 0).then(|| TimeDelta::from_micros_float((sum / n as f64).round()))
    }

    pub fn average_bandwidth(&self, count: usize) -> Option<DataRate> {
        let (sum, n) = self
            .recent(count)
            .fold((0.0, 0), |(sum, n), s| (sum + s.bandwidth.bps_float(), n + 1));
        (n > 0).then(|| DataRate::from_bits_per_sec_float(sum / n as f64))
    }

    /// Population standard deviation of the last `count` RTTs.
    pub fn rtt_std_dev(&self, count: usize) -> TimeDelta {
        let rtts: Vec<f64> = self.recent(count).map(|s| s.rtt.us_float()).collect();
        if rtts.is_empty() {
            return TimeDelta::zero();
        }
        let mean = rtts.iter().sum::<f64>() / rtts.len() as f64;
        if mean.is_infinite() {
            return TimeDelta::plus_infinity();
        }
        let variance =
            rtts.iter().map(|rtt| (rtt - mean).powi(2)).sum::<f64>() / rtts.len() as f64;
        TimeDelta::from_micros_float(variance.sqrt().round())
    }
}
