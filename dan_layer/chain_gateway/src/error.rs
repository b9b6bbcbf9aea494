//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("provider error: {0}")]
    Provider(#[from] ethers::providers::ProviderError),
    #[error("contract error: {0}")]
    Contract(String),
    #[error("finalized block tag unavailable from RPC")]
    FinalizedBlockUnavailable,
}
