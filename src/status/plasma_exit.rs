// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::types::TxHash;

use super::exit::ExitStatus;
use super::plasma_confirm::PlasmaConfirmStatus;
use super::{receipt_failed, StatusResolver, TransactionState};
use crate::store::ChainScope;

/// Status space of the reliable plasma-exit check: the plain exit codes plus
/// `NotExited`, reported when `processExits(...)` went through on chain but
/// the exit NFT still exists: the caller is expected to ask the user to
/// call `processExits` again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReliableExitStatus {
    Exit(ExitStatus),
    NotExited,
}

impl ReliableExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ReliableExitStatus::Exit(exit) => exit.code(),
            ReliableExitStatus::NotExited => -13,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ReliableExitStatus::Exit(exit) => exit.message(),
            ReliableExitStatus::NotExited => "Plasma exit called, but not exited",
        }
    }

    pub fn state(&self) -> TransactionState {
        TransactionState::new(self.code(), self.message())
    }
}

impl StatusResolver {
    /// Status of a `processExits(...)` call on the root chain, by receipt
    /// alone.
    pub async fn plasma_exit_status(&self, tx_hash: TxHash) -> TransactionState {
        self.resolve_root_exit(tx_hash).await.state()
    }

    /// Improved version of [`StatusResolver::plasma_exit_status`] that also
    /// takes the exit NFT into account. `processExits` can succeed as a
    /// transaction yet fail to exit this particular withdraw (a crowded exit
    /// queue exhausts the gas it was given); the NFT still existing reveals
    /// that case.
    pub async fn reliable_plasma_exit_status(
        &self,
        burn_tx_hash: TxHash,
        confirm_tx_hash: TxHash,
        exit_tx_hash: TxHash,
    ) -> TransactionState {
        self.resolve_reliable_plasma_exit(burn_tx_hash, confirm_tx_hash, exit_tx_hash)
            .await
            .state()
    }

    async fn resolve_reliable_plasma_exit(
        &self,
        burn_tx_hash: TxHash,
        confirm_tx_hash: TxHash,
        exit_tx_hash: TxHash,
    ) -> ReliableExitStatus {
        if let Some(cached) = self
            .cached_status(ChainScope::Root, exit_tx_hash, ExitStatus::STABLE_CODES)
            .await
        {
            return if cached.code == ExitStatus::Failed.code() {
                ReliableExitStatus::Exit(ExitStatus::Failed)
            } else {
                ReliableExitStatus::Exit(ExitStatus::Exited)
            };
        }

        let Some(receipt) = self.fetch_receipt(ChainScope::Root, exit_tx_hash).await else {
            return ReliableExitStatus::Exit(ExitStatus::Pending);
        };

        if receipt_failed(&receipt) {
            let status = ExitStatus::Failed;
            self.persist(
                ChainScope::Root,
                exit_tx_hash,
                status.code(),
                status.message(),
            )
            .await;
            return ReliableExitStatus::Exit(status);
        }

        // The exit tx itself went through; whether this withdraw actually
        // exited is decided by the confirm flow's view of the exit NFT.
        match self
            .resolve_plasma_confirm(burn_tx_hash, confirm_tx_hash)
            .await
        {
            PlasmaConfirmStatus::ExitableIn(_) | PlasmaConfirmStatus::ReadyToExit => {
                ReliableExitStatus::NotExited
            }
            PlasmaConfirmStatus::Exited => {
                let status = ExitStatus::Exited;
                self.persist(
                    ChainScope::Root,
                    exit_tx_hash,
                    status.code(),
                    status.message(),
                )
                .await;
                ReliableExitStatus::Exit(status)
            }
            // Not expected under normal circumstances; kept to absorb
            // whatever the confirm lookup ran into.
            _ => ReliableExitStatus::Exit(ExitStatus::Pending),
        }
    }
}
