//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::{collections::HashMap, sync::Arc, time::Duration};

use cache_client::Cache;
use common_types::{Address, Node, NodeStat};
use tokio::{sync::RwLock, task::JoinSet};

use crate::error::ScoreMaintainerError;

const LOG_TARGET: &str = "global_indexer::score_maintainer";

/// TTL of the short-lived fence around the demotion path. Distinct from the
/// Settler's 5-minute leadership lock; this one only needs to outlive a
/// single Redis round-trip.
const DEMOTION_LOCK_TTL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct EndpointCache {
    endpoint: String,
    access_token: String,
}

/// Hybrid in-memory / distributed ranked set scoring candidate Nodes by
/// reliability and selecting the top-K qualified endpoints.
///
/// The distributed sorted set (`set_key` in the Cache Client) is
/// authoritative for *membership and rank*; `node_endpoint_map` is
/// authoritative for *endpoint metadata*. A Node is eligible iff it appears
/// in both - these two layers are deliberately never collapsed into one
/// structure (see Invariant M1/M2).
pub struct ScoreMaintainer {
    cache: Arc<dyn Cache>,
    set_key: String,
    demotion_threshold: u64,
    node_endpoint_map: RwLock<HashMap<Address, EndpointCache>>,
}

fn invalid_request_key(address: &Address) -> String {
    format!("InvalidRequestCount:{}", address.to_hex())
}

fn valid_request_key(address: &Address) -> String {
    format!("ValidRequestCount:{}", address.to_hex())
}

fn demotion_lock_name(set_key: &str) -> String {
    format!("score:{set_key}")
}

impl ScoreMaintainer {
    /// Construction algorithm (`spec.md` §4.D): reconciles the cache's
    /// counters into `stats`, publishes the resulting members into the
    /// sorted set, prunes anything stale, and installs the endpoint map.
    pub async fn new(
        cache: Arc<dyn Cache>,
        set_key: String,
        demotion_threshold: u64,
        stats: Vec<NodeStat>,
    ) -> Result<Self, ScoreMaintainerError> {
        let this = Self {
            cache,
            set_key,
            demotion_threshold,
            node_endpoint_map: RwLock::new(HashMap::new()),
        };
        this.reconcile(stats).await?;
        Ok(this)
    }

    async fn reconcile(&self, stats: Vec<NodeStat>) -> Result<(), ScoreMaintainerError> {
        let reconciled = reconcile_stats(&self.cache, self.demotion_threshold, stats).await?;

        let new_members: Vec<(String, f64)> = reconciled
            .iter()
            .map(|stat| (stat.address.to_hex(), stat.score))
            .collect();
        self.cache.zadd(&self.set_key, &new_members).await?;

        let on_chain = self.cache.zrevrange_with_scores(&self.set_key, 0, -1).await?;
        let new_keys: std::collections::HashSet<String> =
            reconciled.iter().map(|stat| stat.address.to_hex()).collect();
        let stale: Vec<String> = on_chain
            .into_iter()
            .map(|(member, _)| member)
            .filter(|member| !new_keys.contains(member))
            .collect();
        if !stale.is_empty() {
            log::debug!(target: LOG_TARGET, "pruning {} stale members from '{}'", stale.len(), self.set_key);
            self.cache.zrem(&self.set_key, &stale).await?;
        }

        let new_map = reconciled
            .into_iter()
            .map(|stat| {
                (
                    stat.address,
                    EndpointCache {
                        endpoint: stat.endpoint,
                        access_token: stat.access_token,
                    },
                )
            })
            .collect();
        *self.node_endpoint_map.write().await = new_map;

        Ok(())
    }

    /// Per-event hot path. Non-members are never promoted here - only
    /// wholesale reconciliation can add a Node to the map.
    pub async fn add_or_update_score(&self, stat: &NodeStat) -> Result<(), ScoreMaintainerError> {
        {
            let map = self.node_endpoint_map.read().await;
            if !map.contains_key(&stat.address) {
                return Ok(());
            }
        }

        // Known hazard (spec.md §4.D, §9 issue #1): without a fence, a
        // concurrent reconciliation could re-add this address with a
        // positive score right after a demotion ZRem. Close it with a short
        // lock scoped to exactly this check-then-act sequence - widening it
        // to cover `update_qualified_nodes_map` would over-serialize work
        // the spec explicitly allows to race (§5).
        let lock_name = demotion_lock_name(&self.set_key);
        let lock = self
            .cache
            .lock(&lock_name, DEMOTION_LOCK_TTL)
            .await?
            .ok_or_else(|| ScoreMaintainerError::LockUnavailable(lock_name.clone()))?;

        let result = if stat.is_demoted(self.demotion_threshold) {
            self.cache.zrem(&self.set_key, &[stat.address.to_hex()]).await
        } else {
            self.cache
                .zadd(&self.set_key, &[(stat.address.to_hex(), stat.score)])
                .await
        };

        self.cache.unlock(lock).await?;
        result.map_err(Into::into)
    }

    /// Read path. Returns at most `n` entries in the set's descending-score
    /// order, silently dropping any address absent from the endpoint map
    /// (a stale set entry not yet pruned by reconciliation).
    pub async fn retrieve_qualified_nodes(&self, n: usize) -> Result<Vec<Node>, ScoreMaintainerError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let top = self
            .cache
            .zrevrange_with_scores(&self.set_key, 0, n as isize - 1)
            .await?;

        let map = self.node_endpoint_map.read().await;
        let mut result = Vec::with_capacity(top.len());
        for (member, _score) in top {
            let Ok(address) = member.parse::<Address>() else {
                continue;
            };
            if let Some(cached) = map.get(&address) {
                result.push(Node {
                    address,
                    endpoint: cached.endpoint.clone(),
                    access_token: cached.access_token.clone(),
                });
            }
        }
        Ok(result)
    }

    /// Periodic wholesale replacement of the endpoint map only - the
    /// sorted set is untouched. Retains only stats below the demotion
    /// threshold; replacement is atomic under the writer lock.
    pub async fn update_qualified_nodes_map(&self, stats: Vec<NodeStat>) {
        let new_map = stats
            .into_iter()
            .filter(|stat| !stat.is_demoted(self.demotion_threshold))
            .map(|stat| {
                (
                    stat.address,
                    EndpointCache {
                        endpoint: stat.endpoint,
                        access_token: stat.access_token,
                    },
                )
            })
            .collect();
        *self.node_endpoint_map.write().await = new_map;
    }
}

/// Loads invalid/valid counters from the cache for each stat with bounded
/// concurrency `min(len(stats), 20 * NumCPU)`, mutating each stat in place,
/// and returns only those below the demotion threshold with a fresh score.
async fn reconcile_stats(
    cache: &Arc<dyn Cache>,
    demotion_threshold: u64,
    stats: Vec<NodeStat>,
) -> Result<Vec<NodeStat>, ScoreMaintainerError> {
    let bound = if stats.is_empty() {
        1
    } else {
        stats.len().min(20 * num_cpus::get())
    };
    let semaphore = Arc::new(tokio::sync::Semaphore::new(bound));

    let mut tasks = JoinSet::new();
    for stat in stats {
        let cache = cache.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            reconcile_one(cache.as_ref(), demotion_threshold, stat).await
        });
    }

    let mut reconciled = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        if let Some(stat) = joined?? {
            reconciled.push(stat);
        }
    }
    // Score-descending, then lexicographic on address, matching
    // `retrieveQualifiedNodes`'s documented tiebreak.
    reconciled.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.address.to_hex().cmp(&b.address.to_hex()))
    });

    Ok(reconciled)
}

/// Loads and reconciles the counters for a single stat. Returns `None` if
/// the Node is at or above the demotion threshold - such nodes are excluded
/// upstream of the scorer entirely, per `spec.md` §4.C.
async fn reconcile_one(
    cache: &dyn Cache,
    demotion_threshold: u64,
    mut stat: NodeStat,
) -> Result<Option<NodeStat>, ScoreMaintainerError> {
    let invalid_key = invalid_request_key(&stat.address);
    let cached_invalid = match cache_client::get::<u64>(cache, &invalid_key).await? {
        Some(v) => v,
        None => {
            cache_client::set(cache, &invalid_key, &stat.epoch_invalid_request, Duration::ZERO).await?;
            stat.epoch_invalid_request
        },
    };

    let valid_key = valid_request_key(&stat.address);
    let cached_valid = match cache_client::get::<u64>(cache, &valid_key).await? {
        Some(v) => v,
        None => {
            cache_client::set(cache, &valid_key, &stat.epoch_request, Duration::ZERO).await?;
            stat.epoch_request
        },
    };

    stat.epoch_invalid_request = cached_invalid;
    if cached_valid > stat.epoch_request {
        stat.total_request += cached_valid - stat.epoch_request;
        stat.epoch_request = cached_valid;
    }

    if cached_invalid >= demotion_threshold {
        return Ok(None);
    }

    stat.score = reliability_scorer::score(&stat);
    Ok(Some(stat))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cache_client::memory::InMemoryCache;
    use common_types::Address;

    use super::*;

    fn stat(addr: u8, invalid: u64, total: u64, epoch_request: u64) -> NodeStat {
        NodeStat {
            address: Address::new([addr; 20]),
            endpoint: format!("https://node-{addr}.example"),
            access_token: "token".to_string(),
            total_request: total,
            epoch_request,
            epoch_invalid_request: invalid,
            score: 0.0,
        }
    }

    const DEMOTION_THRESHOLD: u64 = 10;

    #[tokio::test]
    async fn empty_bootstrap_yields_empty_set_and_map() {
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
        let maintainer = ScoreMaintainer::new(cache, "nodes".to_string(), DEMOTION_THRESHOLD, vec![])
            .await
            .unwrap();

        assert!(maintainer.retrieve_qualified_nodes(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn demotion_removes_node_from_qualified_set() {
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
        let a = stat(0xaa, DEMOTION_THRESHOLD - 1, 100, 100);
        let maintainer = ScoreMaintainer::new(cache, "nodes".to_string(), DEMOTION_THRESHOLD, vec![a.clone()])
            .await
            .unwrap();

        let qualified = maintainer.retrieve_qualified_nodes(5).await.unwrap();
        assert_eq!(qualified.len(), 1);
        assert_eq!(qualified[0].address, a.address);

        let demoted = stat(0xaa, DEMOTION_THRESHOLD, 100, 100);
        maintainer.add_or_update_score(&demoted).await.unwrap();

        assert!(maintainer.retrieve_qualified_nodes(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_set_members_are_pruned_on_reconcile() {
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
        let b = Address::new([0xbb; 20]);
        let c = Address::new([0xcc; 20]);
        cache
            .zadd("nodes", &[(b.to_hex(), 1.0), (c.to_hex(), 2.0)])
            .await
            .unwrap();

        let b_stat = stat(0xbb, 0, 10, 10);
        let maintainer = ScoreMaintainer::new(cache.clone(), "nodes".to_string(), DEMOTION_THRESHOLD, vec![b_stat])
            .await
            .unwrap();

        let remaining = cache.zrevrange_with_scores("nodes", 0, -1).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, b.to_hex());

        let qualified = maintainer.retrieve_qualified_nodes(5).await.unwrap();
        assert_eq!(qualified.len(), 1);
        assert_eq!(qualified[0].address, b);
    }

    #[tokio::test]
    async fn add_or_update_score_ignores_non_members() {
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
        let maintainer = ScoreMaintainer::new(cache, "nodes".to_string(), DEMOTION_THRESHOLD, vec![])
            .await
            .unwrap();

        let stranger = stat(0xee, 0, 10, 10);
        maintainer.add_or_update_score(&stranger).await.unwrap();
        assert!(maintainer.retrieve_qualified_nodes(5).await.unwrap().is_empty());
    }
}
