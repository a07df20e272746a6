// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::types::{TxHash, U256};
use tracing::warn;

use super::{find_log_by_topic, receipt_failed, StatusResolver, TransactionState};
use crate::abi::state_synced_topic;
use crate::store::ChainScope;

/// Status space of a root chain `depositFor`/`depositEtherFor` transaction.
/// A deposit is only complete once state sync has carried it to the child
/// chain, which is why the terminal check consults the last synced state id
/// rather than just the receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DepositStatus {
    Deposited,
    EnRoute,
    Failed,
    BadDepositHash,
    Pending,
}

impl DepositStatus {
    pub const STABLE_CODES: &'static [i32] = &[0, 2, 3];

    pub fn code(&self) -> i32 {
        match self {
            DepositStatus::Deposited => 0,
            DepositStatus::EnRoute => 1,
            DepositStatus::Failed => 2,
            DepositStatus::BadDepositHash => 3,
            DepositStatus::Pending => 4,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DepositStatus::Deposited => "Deposited",
            DepositStatus::EnRoute => "En Route",
            DepositStatus::Failed => "Failed",
            DepositStatus::BadDepositHash => "Bad Deposit Hash",
            DepositStatus::Pending => "Pending",
        }
    }

    pub fn state(&self) -> TransactionState {
        TransactionState::new(self.code(), self.message())
    }
}

impl StatusResolver {
    /// Given a deposit transaction hash, returns how far along the deposit
    /// is. Approval needs to be performed first; track that with
    /// [`StatusResolver::approval_status`] and this one with the
    /// `depositFor`/`depositEtherFor` hash.
    pub async fn deposit_status(&self, tx_hash: TxHash) -> TransactionState {
        if let Some(cached) = self
            .cached_status(ChainScope::Root, tx_hash, DepositStatus::STABLE_CODES)
            .await
        {
            return cached.into();
        }

        let Some(receipt) = self.fetch_receipt(ChainScope::Root, tx_hash).await else {
            return DepositStatus::Pending.state();
        };

        // A genuine deposit emits StateSynced(uint256,address,bytes); a
        // receipt without it was never a deposit call.
        let Some(sync_log) = find_log_by_topic(&receipt, state_synced_topic()) else {
            let status = DepositStatus::BadDepositHash;
            self.persist(ChainScope::Root, tx_hash, status.code(), status.message())
                .await;
            return status.state();
        };

        if receipt_failed(&receipt) {
            let status = DepositStatus::Failed;
            self.persist(ChainScope::Root, tx_hash, status.code(), status.message())
                .await;
            return status.state();
        }

        // The state id this deposit was assigned, from the indexed topic.
        let Some(id_topic) = sync_log.topics.get(1) else {
            return DepositStatus::EnRoute.state();
        };
        let state_sync_id = U256::from_big_endian(id_topic.as_bytes());

        match self.state_ids().last_state_id().await {
            Err(e) => {
                // If the oracle is unreachable right now we assume the fund
                // is on its way to the child chain. It may in fact already
                // have arrived; the next poll corrects that.
                warn!("[StatusResolver] last state id unavailable: {:?}", e);
                self.note_upstream_error("state_id");
                DepositStatus::EnRoute.state()
            }
            Ok(last_state_id) if last_state_id >= state_sync_id => {
                let status = DepositStatus::Deposited;
                self.persist(ChainScope::Root, tx_hash, status.code(), status.message())
                    .await;
                status.state()
            }
            Ok(_) => DepositStatus::EnRoute.state(),
        }
    }
}
