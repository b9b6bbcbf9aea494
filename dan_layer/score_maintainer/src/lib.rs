//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

mod error;
mod maintainer;

pub use error::ScoreMaintainerError;
pub use maintainer::ScoreMaintainer;
