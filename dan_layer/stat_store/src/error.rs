//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("epoch trigger {0} already has a succeeded record")]
    AlreadySettled(u64),
    #[error("database error: {0}")]
    Backend(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("migration error: {0}")]
    Migration(#[from] Box<dyn std::error::Error + Send + Sync>),
    #[error("blocking task panicked: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}
