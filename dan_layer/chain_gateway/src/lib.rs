//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

mod abi;
mod error;
mod gateway;
pub mod testing;

pub use abi::SettlementContract;
pub use error::ChainError;
pub use gateway::{ChainGateway, EthersChainGateway};
