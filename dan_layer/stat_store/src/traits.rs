//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use common_types::{Address, Checkpoint, Epoch, EpochTrigger, Node};

use crate::error::StoreError;

/// Query parameters for `FindEpochs`: descending on `(id desc)`, optionally
/// capped.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochQuery {
    pub limit: Option<i64>,
}

/// Applies pending schema migrations. Split out from [`StatStore`] because
/// it is an operational concern invoked once at startup, not a per-request
/// capability, mirroring the original's separate migration-runner
/// collaborator.
pub trait Migratable {
    fn migrate(&self) -> Result<(), StoreError>;
}

/// Scoped unit-of-work: on early return from `f`, the entire scope rolls
/// back atomically.
#[async_trait::async_trait]
pub trait TransactionScope {
    async fn with_transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce() -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static;
}

/// Durable persistence of per-Node counters, epoch records, and trigger
/// records, consumed by the Score Maintainer and the Settler Loop.
///
/// [`TransactionScope`] is deliberately not a supertrait here: its
/// `with_transaction` method is generic, which would make `dyn StatStore`
/// impossible to form. Concrete stores (e.g. [`crate::postgres::PgStatStore`])
/// implement both traits; callers that need scoped transactions take a
/// concrete store or an additional `TransactionScope` bound.
#[async_trait::async_trait]
pub trait StatStore: Migratable + Send + Sync {
    async fn find_checkpoint(&self, chain_id: u64) -> Result<Checkpoint, StoreError>;
    async fn find_epochs(&self, query: EpochQuery) -> Result<Vec<Epoch>, StoreError>;
    async fn find_latest_epoch_trigger(&self) -> Result<EpochTrigger, StoreError>;
    async fn save_epoch_trigger(&self, trigger: &EpochTrigger) -> Result<(), StoreError>;
    async fn find_nodes(&self, addresses: &[Address]) -> Result<Vec<Node>, StoreError>;
}
