//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::{collections::HashMap, sync::Mutex, time::Duration};

use crate::{cache_trait::Cache, client::Lock, error::CacheError};

/// In-memory [`Cache`] implementation used by the test suites of
/// `score_maintainer` and `settler`, mirroring the pattern of a real Redis
/// deployment without requiring one to run. TTLs are accepted but not
/// enforced - tests that care about expiry drive time explicitly instead.
#[derive(Default)]
pub struct InMemoryCache {
    scalars: Mutex<HashMap<String, String>>,
    sorted_sets: Mutex<HashMap<String, Vec<(String, f64)>>>,
    locks: Mutex<HashMap<String, String>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.scalars.lock().unwrap().get(key).cloned())
    }

    async fn set_raw(&self, key: &str, value: String, _ttl: Duration) -> Result<(), CacheError> {
        self.scalars.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn zadd(&self, set_key: &str, entries: &[(String, f64)]) -> Result<(), CacheError> {
        let mut sets = self.sorted_sets.lock().unwrap();
        let set = sets.entry(set_key.to_string()).or_default();
        for (member, score) in entries {
            set.retain(|(m, _)| m != member);
            set.push((member.clone(), *score));
        }
        Ok(())
    }

    async fn zrem(&self, set_key: &str, members: &[String]) -> Result<(), CacheError> {
        if let Some(set) = self.sorted_sets.lock().unwrap().get_mut(set_key) {
            set.retain(|(m, _)| !members.contains(m));
        }
        Ok(())
    }

    async fn zrevrange_with_scores(
        &self,
        set_key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, CacheError> {
        let sets = self.sorted_sets.lock().unwrap();
        let Some(set) = sets.get(set_key) else {
            return Ok(Vec::new());
        };
        let mut sorted = set.clone();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));

        let len = sorted.len() as isize;
        let normalize = |idx: isize| -> isize {
            if idx < 0 {
                (len + idx).max(0)
            } else {
                idx
            }
        };
        let start = normalize(start).min(len);
        let stop = normalize(stop).min(len - 1);
        if start > stop || len == 0 {
            return Ok(Vec::new());
        }
        Ok(sorted[start as usize..=stop as usize].to_vec())
    }

    async fn lock(&self, name: &str, _ttl: Duration) -> Result<Option<Lock>, CacheError> {
        let mut locks = self.locks.lock().unwrap();
        if locks.contains_key(name) {
            return Ok(None);
        }
        let token = format!("test-token-{name}");
        locks.insert(name.to_string(), token.clone());
        Ok(Some(Lock {
            name: name.to_string(),
            token,
        }))
    }

    async fn renew(&self, lock: &Lock, _ttl: Duration) -> Result<bool, CacheError> {
        Ok(self
            .locks
            .lock()
            .unwrap()
            .get(&lock.name)
            .map(|t| *t == lock.token)
            .unwrap_or(false))
    }

    async fn unlock(&self, lock: Lock) -> Result<(), CacheError> {
        let mut locks = self.locks.lock().unwrap();
        match locks.get(&lock.name) {
            Some(token) if *token == lock.token => {
                locks.remove(&lock.name);
                Ok(())
            },
            _ => Err(CacheError::LockNotHeld(lock.name)),
        }
    }
}
