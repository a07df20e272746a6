// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::types::TxHash;

use super::{receipt_failed, StatusResolver, TransactionState};
use crate::store::ChainScope;

/// Status space shared by the two root chain exit calls: `exit(...)` on the
/// PoS bridge and `processExits(...)` on the plasma bridge. Both are plain
/// receipt-driven checks with the same codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    Exited,
    Failed,
    Pending,
}

impl ExitStatus {
    pub const STABLE_CODES: &'static [i32] = &[-10, -11];

    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Exited => -10,
            ExitStatus::Failed => -11,
            ExitStatus::Pending => -12,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ExitStatus::Exited => "Exited",
            ExitStatus::Failed => "Failed",
            ExitStatus::Pending => "Pending",
        }
    }

    pub fn state(&self) -> TransactionState {
        TransactionState::new(self.code(), self.message())
    }
}

impl StatusResolver {
    /// Status of an `exit(...)` call on the root chain. Checked in the cache
    /// first; a confirmed state is returned without talking to the chain.
    pub async fn pos_exit_status(&self, tx_hash: TxHash) -> TransactionState {
        self.resolve_root_exit(tx_hash).await.state()
    }

    pub(crate) async fn resolve_root_exit(&self, tx_hash: TxHash) -> ExitStatus {
        if let Some(cached) = self
            .cached_status(ChainScope::Root, tx_hash, ExitStatus::STABLE_CODES)
            .await
        {
            return if cached.code == ExitStatus::Failed.code() {
                ExitStatus::Failed
            } else {
                ExitStatus::Exited
            };
        }

        let Some(receipt) = self.fetch_receipt(ChainScope::Root, tx_hash).await else {
            return ExitStatus::Pending;
        };

        let status = if receipt_failed(&receipt) {
            ExitStatus::Failed
        } else {
            ExitStatus::Exited
        };
        self.persist(ChainScope::Root, tx_hash, status.code(), status.message())
            .await;
        status
    }
}
