//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

mod address;
mod checkpoint;
mod epoch;
mod node;

pub use address::Address;
pub use checkpoint::Checkpoint;
pub use epoch::{Epoch, EpochTrigger, TriggerStatus};
pub use node::{Node, NodeStat};
