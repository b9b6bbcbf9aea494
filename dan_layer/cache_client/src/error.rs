//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to decode cached value: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("lock '{0}' is not held by this holder")]
    LockNotHeld(String),
    #[error("circuit breaker open, refusing redis call")]
    CircuitOpen,
}
