//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::sync::Mutex;

use crate::{error::SettlerError, tx_broadcaster::TxBroadcaster};

/// In-memory [`TxBroadcaster`] used by the Settler Loop's own test suite.
/// Records every submission and can be told to fail the next call.
#[derive(Default)]
pub struct FakeTxBroadcaster {
    submissions: Mutex<Vec<u64>>,
    fail_next: Mutex<bool>,
}

impl FakeTxBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_submission(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    pub fn submitted_epochs(&self) -> Vec<u64> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TxBroadcaster for FakeTxBroadcaster {
    async fn submit(&self, epoch_id: u64, _proof: Vec<u8>) -> Result<String, SettlerError> {
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            return Err(SettlerError::Broadcast("simulated failure".to_string()));
        }
        self.submissions.lock().unwrap().push(epoch_id);
        Ok(format!("0xfake{epoch_id}"))
    }
}
