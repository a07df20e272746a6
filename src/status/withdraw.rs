// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::types::TxHash;
use serde::{Deserialize, Serialize};

use super::pos_burn::PosBurnStatus;
use super::StatusResolver;

/// One withdraw to track, as supplied to the v2 endpoint. Plasma withdraws
/// may carry a confirm hash and/or an exit hash alongside the burn hash;
/// PoS withdraws at most an exit hash. Absent hashes decode to zero.
#[derive(Clone, Debug, Deserialize)]
pub struct WithdrawTransaction {
    #[serde(rename = "txHash")]
    pub burn_tx_hash: TxHash,
    #[serde(rename = "isPoS", default)]
    pub is_pos: bool,
    #[serde(rename = "relatedTxHash", default)]
    pub confirm_tx_hash: TxHash,
    #[serde(rename = "exitTxHash", default)]
    pub exit_tx_hash: TxHash,
}

/// Per-withdraw answer of the v2 endpoint; same shape as
/// [`super::TransactionState`] plus the bridge flavor echoed back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WithdrawTransactionStatus {
    pub code: i32,
    #[serde(rename = "msg")]
    pub message: String,
    #[serde(rename = "isPoS")]
    pub is_pos: bool,
}

pub(crate) fn is_empty_tx_hash(tx_hash: TxHash) -> bool {
    tx_hash == TxHash::zero()
}

impl StatusResolver {
    /// Dispatches one withdraw to the flow its populated hash fields select.
    /// Returns `None` when the mandatory burn hash is missing: such items
    /// simply get no entry in the response map.
    pub async fn withdraw_status(
        &self,
        tx: &WithdrawTransaction,
    ) -> Option<WithdrawTransactionStatus> {
        if is_empty_tx_hash(tx.burn_tx_hash) {
            return None;
        }

        let state = if tx.is_pos {
            if !is_empty_tx_hash(tx.exit_tx_hash) {
                self.pos_exit_status(tx.exit_tx_hash).await
            } else {
                // Only the burn hash is available. The exit checker can
                // still tell us whether the withdraw exited; its terminal
                // code is rewritten to -10 so both bridges report a finished
                // exit the same way.
                let mut state = self.pos_burn_status(tx.burn_tx_hash).await;
                if state.code == PosBurnStatus::Exited.code() {
                    state.code = -10;
                }
                state
            }
        } else if !is_empty_tx_hash(tx.exit_tx_hash) {
            self.reliable_plasma_exit_status(tx.burn_tx_hash, tx.confirm_tx_hash, tx.exit_tx_hash)
                .await
        } else if !is_empty_tx_hash(tx.confirm_tx_hash) {
            self.plasma_confirm_status(tx.burn_tx_hash, tx.confirm_tx_hash)
                .await
        } else {
            self.checkpoint_status(tx.burn_tx_hash).await
        };

        Some(WithdrawTransactionStatus {
            code: state.code,
            message: state.message,
            is_pos: tx.is_pos,
        })
    }
}
