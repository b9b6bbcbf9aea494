//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

#[derive(Debug, thiserror::Error)]
pub enum SettlerError {
    #[error("cache error: {0}")]
    Cache(#[from] cache_client::CacheError),
    #[error("store error: {0}")]
    Store(#[from] stat_store::StoreError),
    #[error("chain error: {0}")]
    Chain(#[from] chain_gateway::ChainError),
    #[error("transaction broadcast failed: {0}")]
    Broadcast(String),
    #[error("could not acquire the 'settler' leadership lock")]
    LeadershipLost,
}
