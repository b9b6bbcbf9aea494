//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

mod models;
pub mod schema;

use std::sync::Arc;

use common_types::{Address, Checkpoint, Epoch, EpochTrigger, Node};
use diesel::{
    prelude::*,
    r2d2::{ConnectionManager, Pool},
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use self::models::{CheckpointModel, EpochModel, EpochTriggerModel, NewEpochTrigger, NodeModel};
use crate::{
    error::StoreError,
    traits::{EpochQuery, Migratable, StatStore, TransactionScope},
};

const LOG_TARGET: &str = "global_indexer::stat_store::postgres";

pub static MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Postgres-backed [`StatStore`]. Blocking Diesel calls are dispatched
/// through `spawn_blocking` so the async Settler Loop and Score Maintainer
/// never block their executor on a database round-trip.
pub struct PgStatStore {
    pool: Arc<PgPool>,
}

impl PgStatStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder().build(manager).map_err(|err| {
            StoreError::Migration(Box::new(err))
        })?;
        Ok(Self { pool: Arc::new(pool) })
    }

    async fn spawn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

impl Migratable for PgStatStore {
    fn migrate(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let applied = conn
            .run_pending_migrations(&MIGRATIONS)
            .map_err(|err| StoreError::Migration(err))?;
        for migration in applied {
            log::info!(target: LOG_TARGET, "applied migration {migration}");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TransactionScope for PgStatStore {
    async fn with_transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce() -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            conn.transaction(|_conn| f().map_err(|_| diesel::result::Error::RollbackTransaction))
        })
        .await?
        .map_err(StoreError::from)
    }
}

#[async_trait::async_trait]
impl StatStore for PgStatStore {
    async fn find_checkpoint(&self, chain_id: u64) -> Result<Checkpoint, StoreError> {
        use schema::checkpoints::dsl;

        self.spawn(move |conn| {
            dsl::checkpoints
                .filter(dsl::chain_id.eq(chain_id as i64))
                .first::<CheckpointModel>(conn)
                .optional()?
                .map(CheckpointModel::into_checkpoint)
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn find_epochs(&self, query: EpochQuery) -> Result<Vec<Epoch>, StoreError> {
        use schema::epochs::dsl;

        self.spawn(move |conn| {
            let mut q = dsl::epochs.order(dsl::id.desc()).into_boxed();
            if let Some(limit) = query.limit {
                q = q.limit(limit);
            }
            let rows = q.load::<EpochModel>(conn)?;
            Ok(rows.into_iter().map(EpochModel::into_epoch).collect())
        })
        .await
    }

    async fn find_latest_epoch_trigger(&self) -> Result<EpochTrigger, StoreError> {
        use schema::epoch_triggers::dsl;

        self.spawn(move |conn| {
            dsl::epoch_triggers
                .order(dsl::id.desc())
                .first::<EpochTriggerModel>(conn)
                .optional()?
                .map(EpochTriggerModel::try_into_trigger)
                .transpose()?
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn save_epoch_trigger(&self, trigger: &EpochTrigger) -> Result<(), StoreError> {
        use schema::epoch_triggers::dsl;

        let new_row = NewEpochTrigger::from(trigger);
        self.spawn(move |conn| {
            // `created_at` is set once per `submitEpochProof`/`retryEpochProof`
            // call and reused unchanged across that call's pending save and
            // its final succeeded/failed save, so matching on
            // `(epoch_id, created_at)` updates only this attempt's own row.
            // Matching on transaction_hash-or-empty instead would also catch
            // a *different*, earlier attempt that failed with an empty hash,
            // overwriting its row (and its `created_at`) instead of inserting
            // a fresh one - corrupting the trigger history `spec.md` §3
            // requires and `timeSinceLastTrigger` depends on.
            let existing = dsl::epoch_triggers
                .filter(dsl::epoch_id.eq(new_row.epoch_id))
                .filter(dsl::created_at.eq(new_row.created_at))
                .select(dsl::id)
                .first::<i64>(conn)
                .optional()?;

            let result = match existing {
                Some(id) => diesel::update(dsl::epoch_triggers.find(id))
                    .set((
                        dsl::transaction_hash.eq(&new_row.transaction_hash),
                        dsl::status.eq(&new_row.status),
                    ))
                    .execute(conn),
                None => diesel::insert_into(dsl::epoch_triggers)
                    .values(&new_row)
                    .execute(conn),
            };

            match result {
                Ok(_) => Ok(()),
                Err(diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                )) => Err(StoreError::AlreadySettled(new_row.epoch_id as u64)),
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    async fn find_nodes(&self, addresses: &[Address]) -> Result<Vec<Node>, StoreError> {
        use schema::nodes::dsl;

        let addresses: Vec<String> = addresses.iter().map(|a| a.to_hex()).collect();
        self.spawn(move |conn| {
            let rows = dsl::nodes
                .filter(dsl::address.eq_any(&addresses))
                .load::<NodeModel>(conn)?;
            rows.into_iter().map(NodeModel::try_into_node).collect()
        })
        .await
    }
}
