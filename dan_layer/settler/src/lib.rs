//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

mod error;
mod settler;
pub mod testing;
mod transition;
mod tx_broadcaster;

pub use error::SettlerError;
pub use settler::Settler;
pub use transition::{Action, Transition};
pub use tx_broadcaster::{EthersTxBroadcaster, TxBroadcaster};
