//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

#[derive(Debug, thiserror::Error)]
pub enum ScoreMaintainerError {
    #[error("cache error: {0}")]
    Cache(#[from] cache_client::CacheError),
    #[error("reconciliation task panicked: {0}")]
    JoinError(#[from] tokio::task::JoinError),
    #[error("failed to acquire demotion lock for set '{0}'")]
    LockUnavailable(String),
}
