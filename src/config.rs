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
    algorithm::{AlgorithmKind, BbrConfig},
    network_condition::ClassifierConfig,
    units::{DataSize, TimeDelta},
};

/// Every tunable of the engine, shared by all sessions of a registry.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    // Algorithm a new session starts with.
    pub initial_algorithm: AlgorithmKind,

    // Minimum time between two automatic switches.
    pub switch_cooldown: TimeDelta,

    // Idle time after which `sweep_expired` evicts a session.
    pub session_timeout: TimeDelta,

    // RTT/bandwidth samples kept per session.
    pub history_capacity: usize,

    // Converts byte quantities (BDP, pacing) to and from segments.
    pub segment_size: DataSize,

    pub classifier: ClassifierConfig,

    pub bbr: BbrConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_algorithm: AlgorithmKind::Reno,
            switch_cooldown: TimeDelta::from_seconds(10),
            session_timeout: TimeDelta::from_seconds(300),
            history_capacity: 50,
            segment_size: DataSize::from_bytes(1024),
            classifier: ClassifierConfig::default(),
            bbr: BbrConfig::default(),
        }
    }
}
