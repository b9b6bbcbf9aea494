//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::{collections::HashMap, sync::Arc};

use ethers::{
    providers::{Middleware, Provider, Ws},
    types::BlockNumber,
};

use crate::{abi::SettlementContract, error::ChainError};

const LOG_TARGET: &str = "global_indexer::chain_gateway";

/// Read-only access to the L2 (`spec.md` §4.E): finalized block number,
/// current on-chain epoch, and static per-chain genesis epoch times.
#[async_trait::async_trait]
pub trait ChainGateway: Send + Sync {
    async fn finalized_block_number(&self) -> Result<u64, ChainError>;
    async fn current_epoch(&self) -> Result<u64, ChainError>;
    /// `GenesisEpochTime(chainID) -> unixSeconds | absent`. Read from
    /// configuration, never the chain (`SPEC_FULL.md` §4.E).
    fn genesis_epoch_time(&self, chain_id: u64) -> Option<i64>;
}

/// `ethers`-backed implementation over a JSON-RPC/WS L2 provider.
pub struct EthersChainGateway {
    provider: Arc<Provider<Ws>>,
    settlement_contract: SettlementContract<Provider<Ws>>,
    genesis_epoch_map: HashMap<u64, i64>,
}

impl EthersChainGateway {
    pub fn new(
        provider: Arc<Provider<Ws>>,
        settlement_contract_address: ethers::types::Address,
        genesis_epoch_map: HashMap<u64, i64>,
    ) -> Self {
        let settlement_contract = SettlementContract::new(settlement_contract_address, provider.clone());
        Self {
            provider,
            settlement_contract,
            genesis_epoch_map,
        }
    }
}

#[async_trait::async_trait]
impl ChainGateway for EthersChainGateway {
    async fn finalized_block_number(&self) -> Result<u64, ChainError> {
        let block = self
            .provider
            .get_block(BlockNumber::Finalized)
            .await?
            .ok_or(ChainError::FinalizedBlockUnavailable)?;
        let number = block.number.ok_or(ChainError::FinalizedBlockUnavailable)?;
        Ok(number.as_u64())
    }

    async fn current_epoch(&self) -> Result<u64, ChainError> {
        self.settlement_contract
            .current_epoch()
            .call()
            .await
            .map_err(|err| ChainError::Contract(err.to_string()))
    }

    fn genesis_epoch_time(&self, chain_id: u64) -> Option<i64> {
        self.genesis_epoch_map.get(&chain_id).copied()
    }
}
