//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::{error::CacheError, client::Lock};

/// Typed facade over a distributed key/value and sorted-set store, as
/// described by the Cache Client component (`spec.md` §4.A). Scalars are
/// handed across as already-encoded JSON so the trait stays object-safe;
/// [`get`]/[`set`] provide the typed convenience layer callers actually use.
#[async_trait::async_trait]
pub trait Cache: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// `ttl == Duration::ZERO` means no expiry.
    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn zadd(&self, set_key: &str, entries: &[(String, f64)]) -> Result<(), CacheError>;

    async fn zrem(&self, set_key: &str, members: &[String]) -> Result<(), CacheError>;

    /// Inclusive `start`/`stop` indices, descending by score; `-1` means
    /// "last member".
    async fn zrevrange_with_scores(
        &self,
        set_key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, CacheError>;

    /// Auto-expiry must be at least 5 minutes for the Settler loop's
    /// leadership lock; shorter-lived locks (e.g. the Score Maintainer's
    /// demotion fence) use smaller TTLs freely.
    async fn lock(&self, name: &str, ttl: Duration) -> Result<Option<Lock>, CacheError>;

    async fn renew(&self, lock: &Lock, ttl: Duration) -> Result<bool, CacheError>;

    async fn unlock(&self, lock: Lock) -> Result<(), CacheError>;
}

/// `Get(key, outDecoder) -> ok | missing | error`. `missing` is represented
/// by `Ok(None)`, distinguishable from a transport error.
pub async fn get<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Result<Option<T>, CacheError> {
    match cache.get_raw(key).await? {
        None => Ok(None),
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
    }
}

pub async fn set<T: Serialize>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value)?;
    cache.set_raw(key, raw, ttl).await
}
