// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::types::TxHash;
use tracing::warn;

use super::burn::BurnStatus;
use super::checkpoint::CheckpointStatus;
use super::{StatusResolver, TransactionState};
use crate::store::ChainScope;

/// Status space of a PoS withdraw tracked by its burn hash: the checkpoint
/// flow's states pass through, plus the terminal `Exited` reported by the
/// exit checker service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PosBurnStatus {
    Checkpoint(CheckpointStatus),
    Exited,
}

impl PosBurnStatus {
    pub const STABLE_CODES: &'static [i32] = &[-5, -2];

    pub fn code(&self) -> i32 {
        match self {
            PosBurnStatus::Checkpoint(checkpoint) => checkpoint.code(),
            PosBurnStatus::Exited => -5,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PosBurnStatus::Checkpoint(checkpoint) => checkpoint.message(),
            PosBurnStatus::Exited => "Exited",
        }
    }

    pub fn state(&self) -> TransactionState {
        TransactionState::new(self.code(), self.message())
    }
}

impl StatusResolver {
    /// Given a burn hash on the child chain, checks whether the withdraw has
    /// exited through the PoS bridge, by asking the exit checker service
    /// once the burn is checkpointed.
    pub async fn pos_burn_status(&self, tx_hash: TxHash) -> TransactionState {
        self.resolve_pos_burn(tx_hash).await.state()
    }

    pub(crate) async fn resolve_pos_burn(&self, tx_hash: TxHash) -> PosBurnStatus {
        if let Some(cached) = self
            .cached_status(ChainScope::Child, tx_hash, PosBurnStatus::STABLE_CODES)
            .await
        {
            return if cached.code == PosBurnStatus::Exited.code() {
                PosBurnStatus::Exited
            } else {
                PosBurnStatus::Checkpoint(CheckpointStatus::Burn(BurnStatus::Failed))
            };
        }

        let checkpoint = self.resolve_checkpoint(tx_hash).await;
        if checkpoint != CheckpointStatus::Checkpointed {
            return PosBurnStatus::Checkpoint(checkpoint);
        }

        match self.exits().is_exit_processed(tx_hash).await {
            Ok(true) => {
                let status = PosBurnStatus::Exited;
                self.persist(ChainScope::Child, tx_hash, status.code(), status.message())
                    .await;
                status
            }
            Ok(false) => PosBurnStatus::Checkpoint(CheckpointStatus::Checkpointed),
            Err(e) => {
                warn!(
                    "[StatusResolver] exit checker unreachable for {:?}: {:?}",
                    tx_hash, e
                );
                self.note_upstream_error("exit_checker");
                PosBurnStatus::Checkpoint(CheckpointStatus::Checkpointed)
            }
        }
    }
}
