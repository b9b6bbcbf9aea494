//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use serde::{Deserialize, Serialize};

/// The last block ingested by the external indexer for a given chain.
/// Written by the indexer; read-only to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub chain_id: u64,
    pub last_indexed_block_number: u64,
}
