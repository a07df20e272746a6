// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::types::{TxHash, U256};
use tracing::warn;

use super::{find_log_by_topic, receipt_failed, StatusResolver, TransactionState};
use crate::abi::exit_started_topic;
use crate::peer_client::ExitEligibility;
use crate::store::ChainScope;

/// Status space of the root chain exit-start call
/// (`startExitWithBurntTokens`). The confirm transaction mints an exit NFT;
/// that token disappearing is what proves the plasma exit finally happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlasmaConfirmStatus {
    Pending,
    BadExitHash,
    Failed,
    /// Still inside the challenge period; the payload is the
    /// seconds-remaining figure reported by the exit-time service.
    ExitableIn(String),
    ReadyToExit,
    Exited,
}

impl PlasmaConfirmStatus {
    pub const STABLE_CODES: &'static [i32] = &[-6, -7, -10];

    pub fn code(&self) -> i32 {
        match self {
            PlasmaConfirmStatus::Pending => -5,
            PlasmaConfirmStatus::BadExitHash => -6,
            PlasmaConfirmStatus::Failed => -7,
            PlasmaConfirmStatus::ExitableIn(_) => -8,
            PlasmaConfirmStatus::ReadyToExit => -9,
            PlasmaConfirmStatus::Exited => -10,
        }
    }

    pub fn message(&self) -> String {
        match self {
            PlasmaConfirmStatus::Pending => "Pending".to_string(),
            PlasmaConfirmStatus::BadExitHash => "Bad Plasma Exit Hash".to_string(),
            PlasmaConfirmStatus::Failed => "Failed".to_string(),
            PlasmaConfirmStatus::ExitableIn(seconds) => format!("Exitable in {}", seconds),
            PlasmaConfirmStatus::ReadyToExit => "Ready To Exit".to_string(),
            PlasmaConfirmStatus::Exited => "Exited".to_string(),
        }
    }

    pub fn state(&self) -> TransactionState {
        TransactionState::new(self.code(), self.message())
    }
}

impl StatusResolver {
    /// Given both the child chain burn hash and the root chain confirm hash,
    /// reports how far along the plasma exit is: up to and including the
    /// exit NFT having been burnt, which means the exit completed.
    pub async fn plasma_confirm_status(
        &self,
        burn_tx_hash: TxHash,
        confirm_tx_hash: TxHash,
    ) -> TransactionState {
        self.resolve_plasma_confirm(burn_tx_hash, confirm_tx_hash)
            .await
            .state()
    }

    pub(crate) async fn resolve_plasma_confirm(
        &self,
        burn_tx_hash: TxHash,
        confirm_tx_hash: TxHash,
    ) -> PlasmaConfirmStatus {
        if let Some(cached) = self
            .cached_status(
                ChainScope::Root,
                confirm_tx_hash,
                PlasmaConfirmStatus::STABLE_CODES,
            )
            .await
        {
            return match cached.code {
                -6 => PlasmaConfirmStatus::BadExitHash,
                -7 => PlasmaConfirmStatus::Failed,
                _ => PlasmaConfirmStatus::Exited,
            };
        }

        let Some(receipt) = self.fetch_receipt(ChainScope::Root, confirm_tx_hash).await else {
            return PlasmaConfirmStatus::Pending;
        };

        // ExitStarted(address,uint256,address,uint256,bool) proves the hash
        // really came out of startExitWithBurntTokens(...).
        let Some(exit_log) = find_log_by_topic(&receipt, exit_started_topic()) else {
            let status = PlasmaConfirmStatus::BadExitHash;
            self.persist(
                ChainScope::Root,
                confirm_tx_hash,
                status.code(),
                &status.message(),
            )
            .await;
            return status;
        };

        if receipt_failed(&receipt) {
            let status = PlasmaConfirmStatus::Failed;
            self.persist(
                ChainScope::Root,
                confirm_tx_hash,
                status.code(),
                &status.message(),
            )
            .await;
            return status;
        }

        // The exit NFT id is the second indexed topic of ExitStarted.
        let Some(exit_id_topic) = exit_log.topics.get(2) else {
            return PlasmaConfirmStatus::ExitableIn("0".to_string());
        };
        let exit_id = U256::from_big_endian(exit_id_topic.as_bytes());

        match self.exit_nft().exists(exit_id).await {
            Err(e) => {
                // Unexpected; assume the NFT still exists (which might not
                // be correct) and report an exit window we cannot size.
                warn!(
                    "[StatusResolver] failed to check if plasma exit NFT exists: {:?}",
                    e
                );
                self.note_upstream_error("exit_nft");
                PlasmaConfirmStatus::ExitableIn("0".to_string())
            }
            Ok(false) => {
                // NFT gone: the plasma exit has happened.
                let status = PlasmaConfirmStatus::Exited;
                self.persist(
                    ChainScope::Root,
                    confirm_tx_hash,
                    status.code(),
                    &status.message(),
                )
                .await;
                status
            }
            Ok(true) => match self.exits().exit_time(burn_tx_hash, confirm_tx_hash).await {
                Ok(ExitEligibility::ExitableIn(seconds)) => {
                    PlasmaConfirmStatus::ExitableIn(seconds)
                }
                Ok(ExitEligibility::ReadyToExit) => PlasmaConfirmStatus::ReadyToExit,
                Err(e) => {
                    warn!(
                        "[StatusResolver] exit-time lookup failed for {:?}: {:?}",
                        confirm_tx_hash, e
                    );
                    self.note_upstream_error("exit_checker");
                    PlasmaConfirmStatus::ExitableIn("0".to_string())
                }
            },
        }
    }
}
