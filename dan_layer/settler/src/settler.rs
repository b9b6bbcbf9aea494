//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::{sync::Arc, time::Duration};

use cache_client::Cache;
use chain_gateway::ChainGateway;
use chrono::Utc;
use common_types::{Checkpoint, EpochTrigger, TriggerStatus};
use stat_store::{EpochQuery, StatStore};
use tokio_util::sync::CancellationToken;

use crate::{
    error::SettlerError,
    transition::{self, Action},
    tx_broadcaster::TxBroadcaster,
};

const LOG_TARGET: &str = "global_indexer::settler";

const LEADER_LOCK_NAME: &str = "settler";
/// Floor enforced by `SPEC_FULL.md` §4.G regardless of the configured value.
pub const LEADER_LOCK_TTL_FLOOR: Duration = Duration::from_secs(5 * 60);
const LEADER_LOCK_RENEW_INTERVAL: Duration = Duration::from_secs(60);

/// The Settler Loop (`spec.md` §4.F): a single-leader control loop that
/// detects epoch transitions, submits on-chain settlement transactions, and
/// recovers from reorgs, indexer lag, and submission failures.
pub struct Settler {
    cache: Arc<dyn Cache>,
    stat_store: Arc<dyn StatStore>,
    chain: Arc<dyn ChainGateway>,
    tx_broadcaster: Arc<dyn TxBroadcaster>,
    chain_id_l2: u64,
    epoch_interval: Duration,
    lock_ttl: Duration,
}

impl Settler {
    pub fn new(
        cache: Arc<dyn Cache>,
        stat_store: Arc<dyn StatStore>,
        chain: Arc<dyn ChainGateway>,
        tx_broadcaster: Arc<dyn TxBroadcaster>,
        chain_id_l2: u64,
        epoch_interval: Duration,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            stat_store,
            chain,
            tx_broadcaster,
            chain_id_l2,
            epoch_interval,
            lock_ttl: lock_ttl.max(LEADER_LOCK_TTL_FLOOR),
        }
    }

    /// Runs the cooperative control loop until `shutdown` is cancelled.
    /// Acquires and renews the `"settler"` leadership lock so that at most
    /// one process in the fleet advances epoch state at a time. The lock is
    /// renewed on its own interval timer raced against the tick's delay
    /// sleep, so a multi-hour `WaitForGenesis`/`WaitForNextSlot` delay can't
    /// let the lock silently expire mid-sleep.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), SettlerError> {
        let lock = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            lock = self.acquire_leadership() => lock?,
        };
        log::info!(target: LOG_TARGET, "acquired settler leadership lock");

        let mut renewal = tokio::time::interval(LEADER_LOCK_RENEW_INTERVAL);
        renewal.tick().await; // first tick fires immediately; lock was just acquired

        'outer: loop {
            let delay = tokio::select! {
                _ = shutdown.cancelled() => {
                    log::info!(target: LOG_TARGET, "shutdown requested, releasing settler lock");
                    break 'outer;
                },
                result = self.tick() => result?,
            };

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break 'outer,
                    _ = &mut sleep => break,
                    _ = renewal.tick() => {
                        if !self.cache.renew(&lock, self.lock_ttl).await? {
                            log::warn!(target: LOG_TARGET, "lost settler leadership lock, stopping");
                            return Err(SettlerError::LeadershipLost);
                        }
                    },
                }
            }
        }

        self.cache.unlock(lock).await?;
        Ok(())
    }

    async fn acquire_leadership(&self) -> Result<cache_client::Lock, SettlerError> {
        loop {
            if let Some(lock) = self.cache.lock(LEADER_LOCK_NAME, self.lock_ttl).await? {
                return Ok(lock);
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    }

    /// Evaluates the transition table once and performs its action. Returns
    /// the delay before the next tick.
    async fn tick(&self) -> Result<Duration, SettlerError> {
        let checkpoint = self.stat_store.find_checkpoint(self.chain_id_l2).await;
        let checkpoint = match checkpoint {
            Ok(c) => c,
            Err(stat_store::StoreError::NotFound) => Checkpoint {
                chain_id: self.chain_id_l2,
                last_indexed_block_number: 0,
            },
            Err(err) => return Err(err.into()),
        };
        let latest_finalized = self.chain.finalized_block_number().await?;

        let epochs = self
            .stat_store
            .find_epochs(EpochQuery { limit: Some(1) })
            .await?;
        let last_epoch = epochs.first();

        let last_trigger = match self.stat_store.find_latest_epoch_trigger().await {
            Ok(trigger) => Some(trigger),
            Err(stat_store::StoreError::NotFound) => None,
            Err(err) => return Err(err.into()),
        };

        let on_chain_current_epoch = self.chain.current_epoch().await?;
        let genesis_epoch_time = self.chain.genesis_epoch_time(self.chain_id_l2);

        let transition = transition::decide(
            checkpoint.last_indexed_block_number,
            latest_finalized,
            last_epoch,
            last_trigger.as_ref(),
            on_chain_current_epoch,
            genesis_epoch_time,
            self.epoch_interval,
            Utc::now(),
        );

        match transition.action {
            Action::Noop
            | Action::WaitForGenesis
            | Action::WaitForFinalization
            | Action::WaitForIndexerIngest
            | Action::WaitForNextSlot => {},
            Action::Submit(epoch_id) => self.submit_epoch_proof(epoch_id).await?,
            Action::Retry(epoch_id) => self.retry_epoch_proof(epoch_id).await?,
        }

        Ok(transition.delay)
    }

    /// `submitEpochProof(epochID)` (`spec.md` §4.F submission contract).
    pub async fn submit_epoch_proof(&self, epoch_id: u64) -> Result<(), SettlerError> {
        let proof = self.build_proof(epoch_id);

        // Persist the trigger as `pending` before broadcasting, so a
        // crash-restart observes the in-flight trigger rather than silently
        // re-submitting or losing track of it.
        let mut trigger = EpochTrigger {
            epoch_id,
            transaction_hash: String::new(),
            created_at: Utc::now(),
            status: TriggerStatus::Pending,
        };
        self.stat_store.save_epoch_trigger(&trigger).await?;

        match self.tx_broadcaster.submit(epoch_id, proof).await {
            Ok(tx_hash) => {
                trigger.transaction_hash = tx_hash;
                trigger.status = TriggerStatus::Succeeded;
                log::info!(target: LOG_TARGET, "epoch {epoch_id} settled: {}", trigger.transaction_hash);
            },
            Err(err) => {
                trigger.status = TriggerStatus::Failed;
                log::warn!(target: LOG_TARGET, "epoch {epoch_id} submission failed: {err}");
            },
        }
        self.stat_store.save_epoch_trigger(&trigger).await?;
        Ok(())
    }

    /// `retryEpochProof(epochID)`: re-runs the submission contract for an
    /// `epochID` whose prior trigger was superseded by a reorg.
    pub async fn retry_epoch_proof(&self, epoch_id: u64) -> Result<(), SettlerError> {
        log::info!(target: LOG_TARGET, "retrying epoch {epoch_id} proof after reorg");
        self.submit_epoch_proof(epoch_id).await
    }

    /// Constructs the settlement-contract-defined proof payload from the
    /// current stats snapshot. The contract's encoding is opaque to the
    /// core (`spec.md` §4.F step 1); only the epoch id is load-bearing here.
    fn build_proof(&self, epoch_id: u64) -> Vec<u8> {
        epoch_id.to_be_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use cache_client::memory::InMemoryCache;
    use chain_gateway::testing::FakeChainGateway;
    use common_types::{Address, Epoch, Node};

    use super::*;
    use crate::testing::FakeTxBroadcaster;

    struct FakeStatStore {
        checkpoint: Checkpoint,
        epochs: Vec<Epoch>,
        triggers: tokio::sync::Mutex<Vec<EpochTrigger>>,
    }

    #[async_trait::async_trait]
    impl stat_store::Migratable for FakeStatStore {
        fn migrate(&self) -> Result<(), stat_store::StoreError> {
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl stat_store::TransactionScope for FakeStatStore {
        async fn with_transaction<F, T>(&self, f: F) -> Result<T, stat_store::StoreError>
        where
            F: FnOnce() -> Result<T, stat_store::StoreError> + Send + 'static,
            T: Send + 'static,
        {
            f()
        }
    }

    #[async_trait::async_trait]
    impl StatStore for FakeStatStore {
        async fn find_checkpoint(&self, _chain_id: u64) -> Result<Checkpoint, stat_store::StoreError> {
            Ok(self.checkpoint.clone())
        }

        async fn find_epochs(&self, query: EpochQuery) -> Result<Vec<Epoch>, stat_store::StoreError> {
            let limit = query.limit.unwrap_or(i64::MAX) as usize;
            Ok(self.epochs.iter().take(limit).cloned().collect())
        }

        async fn find_latest_epoch_trigger(&self) -> Result<EpochTrigger, stat_store::StoreError> {
            self.triggers
                .lock()
                .await
                .last()
                .cloned()
                .ok_or(stat_store::StoreError::NotFound)
        }

        async fn save_epoch_trigger(&self, trigger: &EpochTrigger) -> Result<(), stat_store::StoreError> {
            self.triggers.lock().await.push(trigger.clone());
            Ok(())
        }

        async fn find_nodes(&self, _addresses: &[Address]) -> Result<Vec<Node>, stat_store::StoreError> {
            Ok(vec![])
        }
    }

    fn make_settler(
        epochs: Vec<Epoch>,
        checkpoint_block: u64,
        finalized_block: u64,
        on_chain_epoch: u64,
        broadcaster: Arc<FakeTxBroadcaster>,
    ) -> (Settler, Arc<FakeStatStore>) {
        let cache = Arc::new(InMemoryCache::default());
        let store = Arc::new(FakeStatStore {
            checkpoint: Checkpoint {
                chain_id: 1,
                last_indexed_block_number: checkpoint_block,
            },
            epochs,
            triggers: tokio::sync::Mutex::new(vec![]),
        });
        let chain = Arc::new(FakeChainGateway::new(finalized_block, on_chain_epoch));

        let settler = Settler::new(
            cache,
            store.clone() as Arc<dyn StatStore>,
            chain as Arc<dyn ChainGateway>,
            broadcaster as Arc<dyn TxBroadcaster>,
            1,
            Duration::from_secs(3600),
            LEADER_LOCK_TTL_FLOOR,
        );
        (settler, store)
    }

    #[tokio::test]
    async fn tick_submits_when_no_prior_state() {
        let broadcaster = Arc::new(FakeTxBroadcaster::new());
        let (settler, store) = make_settler(vec![], 100, 100, 41, broadcaster.clone());

        let delay = settler.tick().await.unwrap();
        assert_eq!(delay, Duration::ZERO);
        assert_eq!(broadcaster.submitted_epochs(), vec![42]);
        assert_eq!(store.triggers.lock().await.last().unwrap().status, TriggerStatus::Succeeded);
    }

    #[tokio::test]
    async fn tick_does_nothing_when_indexer_lags() {
        let broadcaster = Arc::new(FakeTxBroadcaster::new());
        let (settler, _store) = make_settler(vec![], 100, 110, 0, broadcaster.clone());

        let delay = settler.tick().await.unwrap();
        assert_eq!(delay, Duration::from_secs(5));
        assert!(broadcaster.submitted_epochs().is_empty());
    }

    #[tokio::test]
    async fn submission_failure_marks_trigger_failed() {
        let broadcaster = Arc::new(FakeTxBroadcaster::new());
        broadcaster.fail_next_submission();
        let (settler, store) = make_settler(vec![], 100, 100, 41, broadcaster);

        settler.tick().await.unwrap();
        let triggers = store.triggers.lock().await;
        assert_eq!(triggers.last().unwrap().status, TriggerStatus::Failed);
    }
}
