//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use redis::{aio::MultiplexedConnection, AsyncCommands};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{cache_trait::Cache, error::CacheError};

const LOG_TARGET: &str = "global_indexer::cache_client";

const CIRCUIT_BREAKER_THRESHOLD: u64 = 3;
const CIRCUIT_BREAKER_COOLDOWN_SECS: u64 = 10;

/// Compare-and-delete Lua script so `unlock` can never release a lock it no
/// longer holds after its token has expired and been re-acquired elsewhere.
const UNLOCK_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

struct CircuitBreaker {
    consecutive_failures: AtomicU64,
    is_open: AtomicBool,
    opened_at: AtomicU64,
}

impl CircuitBreaker {
    fn new() -> Self {
        Self {
            consecutive_failures: AtomicU64::new(0),
            is_open: AtomicBool::new(false),
            opened_at: AtomicU64::new(0),
        }
    }

    fn allow_request(&self) -> bool {
        if !self.is_open.load(Ordering::Acquire) {
            return true;
        }
        let opened = self.opened_at.load(Ordering::Relaxed);
        let now = now_unix_secs();
        now.saturating_sub(opened) >= CIRCUIT_BREAKER_COOLDOWN_SECS
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.is_open.store(false, Ordering::Release);
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= CIRCUIT_BREAKER_THRESHOLD && !self.is_open.swap(true, Ordering::AcqRel) {
            self.opened_at.store(now_unix_secs(), Ordering::Relaxed);
            log::warn!(target: LOG_TARGET, "circuit breaker opened after {failures} consecutive redis failures");
        }
    }
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A held distributed lock. Dropping this without calling
/// [`CacheClient::unlock`] leaves the lock to expire naturally at its TTL.
#[derive(Debug)]
pub struct Lock {
    pub name: String,
    pub(crate) token: String,
}

/// Typed facade over a Redis-backed distributed key/value and sorted-set
/// store, as described by the Cache Client component: JSON-coded scalars,
/// sorted sets for ranking, and fenced distributed locks.
pub struct CacheClient {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    breaker: CircuitBreaker,
}

impl CacheClient {
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            breaker: CircuitBreaker::new(),
        })
    }

    async fn conn(&self) -> Result<MultiplexedConnection, CacheError> {
        if !self.breaker.allow_request() {
            return Err(CacheError::CircuitOpen);
        }
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            match self.client.get_multiplexed_tokio_connection().await {
                Ok(conn) => *guard = Some(conn),
                Err(err) => {
                    self.breaker.record_failure();
                    return Err(err.into());
                },
            }
        }
        // MultiplexedConnection is cheap to clone; each caller gets its own handle.
        Ok(guard.as_ref().expect("just populated above").clone())
    }

    fn note_result<T>(&self, result: Result<T, CacheError>) -> Result<T, CacheError> {
        match result {
            Ok(v) => {
                self.breaker.record_success();
                Ok(v)
            },
            Err(err) => {
                if matches!(err, CacheError::Redis(_)) {
                    self.breaker.record_failure();
                }
                Err(err)
            },
        }
    }

}

#[async_trait::async_trait]
impl Cache for CacheClient {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn().await?;
        self.note_result(conn.get(key).await.map_err(Into::into))
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        if ttl.is_zero() {
            self.note_result(conn.set::<_, _, ()>(key, value).await.map_err(Into::into))
        } else {
            self.note_result(
                conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
                    .await
                    .map_err(Into::into),
            )
        }
    }

    async fn zadd(&self, set_key: &str, entries: &[(String, f64)]) -> Result<(), CacheError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let pairs: Vec<(f64, &str)> = entries.iter().map(|(m, s)| (*s, m.as_str())).collect();
        self.note_result(conn.zadd_multiple::<_, _, _, ()>(set_key, &pairs).await.map_err(Into::into))
    }

    async fn zrem(&self, set_key: &str, members: &[String]) -> Result<(), CacheError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        self.note_result(conn.zrem::<_, _, ()>(set_key, members).await.map_err(Into::into))
    }

    async fn zrevrange_with_scores(
        &self,
        set_key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, CacheError> {
        let mut conn = self.conn().await?;
        self.note_result(
            conn.zrevrange_withscores(set_key, start, stop)
                .await
                .map_err(Into::into),
        )
    }

    async fn lock(&self, name: &str, ttl: Duration) -> Result<Option<Lock>, CacheError> {
        let mut conn = self.conn().await?;
        let token = Uuid::new_v4().to_string();
        let key = lock_key(name);
        let acquired: bool = self.note_result(
            redis::cmd("SET")
                .arg(&key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(ttl.as_millis() as u64)
                .query_async::<_, Option<String>>(&mut conn)
                .await
                .map(|v| v.is_some())
                .map_err(Into::into),
        )?;
        if acquired {
            Ok(Some(Lock {
                name: name.to_string(),
                token,
            }))
        } else {
            Ok(None)
        }
    }

    async fn renew(&self, lock: &Lock, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let script = redis::Script::new(
            r#"
            if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("PEXPIRE", KEYS[1], ARGV[2])
            else
                return 0
            end
            "#,
        );
        let renewed: i32 = self.note_result(
            script
                .key(lock_key(&lock.name))
                .arg(&lock.token)
                .arg(ttl.as_millis() as u64)
                .invoke_async(&mut conn)
                .await
                .map_err(Into::into),
        )?;
        Ok(renewed == 1)
    }

    async fn unlock(&self, lock: Lock) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let script = redis::Script::new(UNLOCK_SCRIPT);
        let deleted: i32 = self.note_result(
            script
                .key(lock_key(&lock.name))
                .arg(&lock.token)
                .invoke_async(&mut conn)
                .await
                .map_err(Into::into),
        )?;
        if deleted == 1 {
            Ok(())
        } else {
            Err(CacheError::LockNotHeld(lock.name))
        }
    }
}

fn lock_key(name: &str) -> String {
    format!("lock:{name}")
}
