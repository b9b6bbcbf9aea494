//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{error::ChainError, gateway::ChainGateway};

/// In-memory [`ChainGateway`] used by the Settler Loop's test suite.
pub struct FakeChainGateway {
    finalized_block: AtomicU64,
    current_epoch: AtomicU64,
    genesis_epoch_map: HashMap<u64, i64>,
}

impl FakeChainGateway {
    pub fn new(finalized_block: u64, current_epoch: u64) -> Self {
        Self {
            finalized_block: AtomicU64::new(finalized_block),
            current_epoch: AtomicU64::new(current_epoch),
            genesis_epoch_map: HashMap::new(),
        }
    }

    pub fn with_genesis(mut self, chain_id: u64, unix_seconds: i64) -> Self {
        self.genesis_epoch_map.insert(chain_id, unix_seconds);
        self
    }

    pub fn set_finalized_block(&self, value: u64) {
        self.finalized_block.store(value, Ordering::Relaxed);
    }

    pub fn set_current_epoch(&self, value: u64) {
        self.current_epoch.store(value, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl ChainGateway for FakeChainGateway {
    async fn finalized_block_number(&self) -> Result<u64, ChainError> {
        Ok(self.finalized_block.load(Ordering::Relaxed))
    }

    async fn current_epoch(&self) -> Result<u64, ChainError> {
        Ok(self.current_epoch.load(Ordering::Relaxed))
    }

    fn genesis_epoch_time(&self, chain_id: u64) -> Option<i64> {
        self.genesis_epoch_map.get(&chain_id).copied()
    }
}
