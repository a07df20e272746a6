// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::types::TxHash;

use super::{receipt_failed, StatusResolver, TransactionState};
use crate::store::ChainScope;

/// Status space of the root chain ERC20 approval that must precede
/// `depositFor`. Approval and failure are terminal; pending is re-derived on
/// every request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalStatus {
    Approved,
    Failed,
    Pending,
}

impl ApprovalStatus {
    pub const STABLE_CODES: &'static [i32] = &[5, 6];

    pub fn code(&self) -> i32 {
        match self {
            ApprovalStatus::Approved => 5,
            ApprovalStatus::Failed => 6,
            ApprovalStatus::Pending => 7,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ApprovalStatus::Approved => "Approved",
            ApprovalStatus::Failed => "Failed",
            ApprovalStatus::Pending => "Pending",
        }
    }

    pub fn state(&self) -> TransactionState {
        TransactionState::new(self.code(), self.message())
    }
}

impl StatusResolver {
    /// Checks whether an ERC20 token approval has completed, given the
    /// transaction hash on the root chain. The token approval must be
    /// performed before `depositFor`, since only then can the root contract
    /// call `transferFrom` on the token being deposited.
    pub async fn approval_status(&self, tx_hash: TxHash) -> TransactionState {
        if let Some(cached) = self
            .cached_status(ChainScope::Root, tx_hash, ApprovalStatus::STABLE_CODES)
            .await
        {
            return cached.into();
        }

        let Some(receipt) = self.fetch_receipt(ChainScope::Root, tx_hash).await else {
            return ApprovalStatus::Pending.state();
        };

        let status = if receipt_failed(&receipt) {
            ApprovalStatus::Failed
        } else {
            ApprovalStatus::Approved
        };
        self.persist(ChainScope::Root, tx_hash, status.code(), status.message())
            .await;
        status.state()
    }
}
