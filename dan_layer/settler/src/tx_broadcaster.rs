//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use chain_gateway::SettlementContract;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Provider, Ws},
    signers::LocalWallet,
};

use crate::error::SettlerError;

const LOG_TARGET: &str = "global_indexer::settler::tx_broadcaster";

/// The external Transaction Manager the Settler Loop depends on but does
/// not implement (`spec.md` §4.F submission contract, step 3). Broadcasts
/// an epoch-proof payload and returns the transaction hash once accepted by
/// the mempool - confirmation and receipt handling live here too, since
/// that's what "broadcast" means contractually for the settler.
#[async_trait::async_trait]
pub trait TxBroadcaster: Send + Sync {
    async fn submit(&self, epoch_id: u64, proof: Vec<u8>) -> Result<String, SettlerError>;
}

type SignerProvider = SignerMiddleware<Provider<Ws>, LocalWallet>;

/// Signs and submits the settlement contract's `commit(epochId, proof)`
/// call via `ethers::middleware::SignerMiddleware`.
pub struct EthersTxBroadcaster {
    contract: SettlementContract<SignerProvider>,
}

impl EthersTxBroadcaster {
    pub fn new(client: Arc<SignerProvider>, settlement_contract_address: ethers::types::Address) -> Self {
        Self {
            contract: SettlementContract::new(settlement_contract_address, client),
        }
    }
}

#[async_trait::async_trait]
impl TxBroadcaster for EthersTxBroadcaster {
    async fn submit(&self, epoch_id: u64, proof: Vec<u8>) -> Result<String, SettlerError> {
        let call = self.contract.commit(epoch_id, proof.into());
        let pending = call
            .send()
            .await
            .map_err(|err| SettlerError::Broadcast(err.to_string()))?;
        let tx_hash = format!("{:#x}", pending.tx_hash());
        log::info!(target: LOG_TARGET, "submitted commit for epoch {epoch_id}: {tx_hash}");
        let receipt = pending
            .await
            .map_err(|err| SettlerError::Broadcast(err.to_string()))?;
        match receipt {
            Some(receipt) if receipt.status.map(|s| s.as_u64()) == Some(1) => Ok(tx_hash),
            _ => Err(SettlerError::Broadcast(format!("commit for epoch {epoch_id} reverted or dropped"))),
        }
    }
}
