//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

diesel::table! {
    nodes (address) {
        address -> Text,
        endpoint -> Text,
        access_token -> Text,
    }
}

diesel::table! {
    node_stats (address) {
        address -> Text,
        endpoint -> Text,
        access_token -> Text,
        total_request -> Int8,
        epoch_request -> Int8,
        epoch_invalid_request -> Int8,
        score -> Double,
    }
}

diesel::table! {
    epochs (id) {
        id -> Int8,
        block_number -> Int8,
        block_timestamp -> Timestamptz,
        finalized -> Bool,
    }
}

diesel::table! {
    epoch_triggers (id) {
        id -> Int8,
        epoch_id -> Int8,
        transaction_hash -> Text,
        created_at -> Timestamptz,
        status -> Text,
    }
}

diesel::table! {
    checkpoints (chain_id) {
        chain_id -> Int8,
        last_indexed_block_number -> Int8,
    }
}
