//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use ethers::contract::abigen;

// Minimal ABI covering only what the core consumes (`spec.md` §6): the
// settlement contract's epoch counter and its commit entrypoint. The full
// contract ABI is out of scope - delegated to the external Transaction
// Manager.
abigen!(
    SettlementContract,
    r#"[
        function currentEpoch() external view returns (uint64)
        function commit(uint64 epochId, bytes calldata proof) external
    ]"#
);
