//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common_types::{Checkpoint, Epoch, EpochTrigger, Node, TriggerStatus};
use diesel::prelude::*;

use crate::{error::StoreError, postgres::schema::*};

#[derive(Debug, Queryable, Identifiable, Insertable)]
#[diesel(table_name = nodes, primary_key(address))]
pub struct NodeModel {
    pub address: String,
    pub endpoint: String,
    pub access_token: String,
}

impl NodeModel {
    pub fn try_into_node(self) -> Result<Node, StoreError> {
        let address = self
            .address
            .parse()
            .map_err(|_| StoreError::Backend(diesel::result::Error::NotFound))?;
        Ok(Node {
            address,
            endpoint: self.endpoint,
            access_token: self.access_token,
        })
    }
}

#[derive(Debug, Queryable, Identifiable)]
#[diesel(table_name = epochs, primary_key(id))]
pub struct EpochModel {
    pub id: i64,
    pub block_number: i64,
    pub block_timestamp: DateTime<Utc>,
    pub finalized: bool,
}

impl EpochModel {
    pub fn into_epoch(self) -> Epoch {
        Epoch {
            id: self.id as u64,
            block_number: self.block_number as u64,
            block_timestamp: self.block_timestamp,
            finalized: self.finalized,
        }
    }
}

#[derive(Debug, Queryable, Identifiable)]
#[diesel(table_name = epoch_triggers, primary_key(id))]
pub struct EpochTriggerModel {
    pub id: i64,
    pub epoch_id: i64,
    pub transaction_hash: String,
    pub created_at: DateTime<Utc>,
    pub status: String,
}

impl EpochTriggerModel {
    pub fn try_into_trigger(self) -> Result<EpochTrigger, StoreError> {
        let status = TriggerStatus::from_str(&self.status)
            .map_err(|_| StoreError::Backend(diesel::result::Error::NotFound))?;
        Ok(EpochTrigger {
            epoch_id: self.epoch_id as u64,
            transaction_hash: self.transaction_hash,
            created_at: self.created_at,
            status,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = epoch_triggers)]
pub struct NewEpochTrigger {
    pub epoch_id: i64,
    pub transaction_hash: String,
    pub created_at: DateTime<Utc>,
    pub status: String,
}

impl From<&EpochTrigger> for NewEpochTrigger {
    fn from(trigger: &EpochTrigger) -> Self {
        Self {
            epoch_id: trigger.epoch_id as i64,
            transaction_hash: trigger.transaction_hash.clone(),
            created_at: trigger.created_at,
            status: trigger.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Queryable, Identifiable)]
#[diesel(table_name = checkpoints, primary_key(chain_id))]
pub struct CheckpointModel {
    pub chain_id: i64,
    pub last_indexed_block_number: i64,
}

impl CheckpointModel {
    pub fn into_checkpoint(self) -> Checkpoint {
        Checkpoint {
            chain_id: self.chain_id as u64,
            last_indexed_block_number: self.last_indexed_block_number as u64,
        }
    }
}
