//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

mod error;
pub mod postgres;
mod traits;

pub use error::StoreError;
pub use postgres::PgStatStore;
pub use traits::{EpochQuery, Migratable, StatStore, TransactionScope};
