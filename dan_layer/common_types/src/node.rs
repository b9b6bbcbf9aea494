//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use serde::{Deserialize, Serialize};

use crate::Address;

/// A data-serving Node identified by its 20-byte staking address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub address: Address,
    pub endpoint: String,
    pub access_token: String,
}

/// Per-Node, per-epoch request counters plus the derived reliability score.
///
/// Invariants (enforced by callers, not this type): `epoch_request` and
/// `epoch_invalid_request` are non-decreasing within an epoch and reset to
/// zero at rollover; `total_request >= epoch_request` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStat {
    pub address: Address,
    pub endpoint: String,
    pub access_token: String,
    pub total_request: u64,
    pub epoch_request: u64,
    pub epoch_invalid_request: u64,
    pub score: f64,
}

impl NodeStat {
    pub fn is_demoted(&self, demotion_threshold: u64) -> bool {
        self.epoch_invalid_request >= demotion_threshold
    }
}
