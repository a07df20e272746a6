// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::types::TxHash;

use super::{receipt_failed, StatusResolver, TransactionState};
use crate::store::ChainScope;

/// Status space of the child chain burn that initiates a withdraw. This is
/// the first stage of both plasma and PoS exits; the composed flows build on
/// it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BurnStatus {
    Pending,
    Failed,
    Burnt,
}

impl BurnStatus {
    pub const STABLE_CODES: &'static [i32] = &[-2, -3];

    /// Any persisted code at or past Burnt settles this flow; re-deriving
    /// from the receipt would overwrite a more advanced status with -3.
    pub(crate) const SETTLED_CODES: &'static [i32] = &[-2, -3, -4, -5];

    pub fn code(&self) -> i32 {
        match self {
            BurnStatus::Pending => -1,
            BurnStatus::Failed => -2,
            BurnStatus::Burnt => -3,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            BurnStatus::Pending => "Pending",
            BurnStatus::Failed => "Failed",
            BurnStatus::Burnt => "Burnt",
        }
    }

    pub fn state(&self) -> TransactionState {
        TransactionState::new(self.code(), self.message())
    }
}

impl StatusResolver {
    /// Given a burn transaction hash on the child chain, reports its current
    /// status. This must complete before the asset can be withdrawn to the
    /// root chain.
    pub async fn burn_status(&self, tx_hash: TxHash) -> TransactionState {
        self.resolve_burn(tx_hash).await.state()
    }

    pub(crate) async fn resolve_burn(&self, tx_hash: TxHash) -> BurnStatus {
        if let Some(cached) = self
            .cached_status(ChainScope::Child, tx_hash, BurnStatus::SETTLED_CODES)
            .await
        {
            return if cached.code == BurnStatus::Failed.code() {
                BurnStatus::Failed
            } else {
                BurnStatus::Burnt
            };
        }

        let Some(receipt) = self.fetch_receipt(ChainScope::Child, tx_hash).await else {
            return BurnStatus::Pending;
        };

        let status = if receipt_failed(&receipt) {
            BurnStatus::Failed
        } else {
            BurnStatus::Burnt
        };
        self.persist(ChainScope::Child, tx_hash, status.code(), status.message())
            .await;
        status
    }
}
