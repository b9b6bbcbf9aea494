//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A protocol-defined settlement interval. IDs form a strictly increasing,
/// gap-free sequence starting at 1; at most one unfinalized epoch exists at
/// a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epoch {
    pub id: u64,
    pub block_number: u64,
    pub block_timestamp: DateTime<Utc>,
    pub finalized: bool,
}

/// Status of a transaction the Settler submitted to advance to an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerStatus {
    Pending,
    Succeeded,
    Failed,
}

impl TriggerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerStatus::Pending => "pending",
            TriggerStatus::Succeeded => "succeeded",
            TriggerStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for TriggerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TriggerStatus::Pending),
            "succeeded" => Ok(TriggerStatus::Succeeded),
            "failed" => Ok(TriggerStatus::Failed),
            other => Err(format!("unknown trigger status {other}")),
        }
    }
}

/// A record of a transaction the Settler submitted to advance to epoch
/// `epoch_id`. Multiple triggers per `epoch_id` are permitted (retries); at
/// most one may be `Succeeded`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochTrigger {
    pub epoch_id: u64,
    pub transaction_hash: String,
    pub created_at: DateTime<Utc>,
    pub status: TriggerStatus,
}
