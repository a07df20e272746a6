// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::types::{TxHash, U256};
use tracing::warn;

use super::burn::BurnStatus;
use super::{StatusResolver, TransactionState};
use crate::store::ChainScope;

/// Status space of a burn on its way to being checkpointed. Everything the
/// burn flow can report passes through unchanged; `Checkpointed` is the one
/// state this flow adds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckpointStatus {
    Burn(BurnStatus),
    Checkpointed,
}

impl CheckpointStatus {
    pub const STABLE_CODES: &'static [i32] = &[-4];

    /// A persisted PoS exit (-5) implies the checkpoint happened; treating
    /// it as settled keeps the cache from being walked back to -4.
    pub(crate) const SETTLED_CODES: &'static [i32] = &[-4, -5];

    pub fn code(&self) -> i32 {
        match self {
            CheckpointStatus::Burn(burn) => burn.code(),
            CheckpointStatus::Checkpointed => -4,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            CheckpointStatus::Burn(burn) => burn.message(),
            CheckpointStatus::Checkpointed => "Checkpointed",
        }
    }

    pub fn state(&self) -> TransactionState {
        TransactionState::new(self.code(), self.message())
    }
}

impl StatusResolver {
    /// Given a burn transaction hash, checks whether the child chain block
    /// it was mined in has been checkpointed onto the root chain yet. Only
    /// after that can the exit be started.
    pub async fn checkpoint_status(&self, tx_hash: TxHash) -> TransactionState {
        self.resolve_checkpoint(tx_hash).await.state()
    }

    pub(crate) async fn resolve_checkpoint(&self, tx_hash: TxHash) -> CheckpointStatus {
        if self
            .cached_status(ChainScope::Child, tx_hash, CheckpointStatus::SETTLED_CODES)
            .await
            .is_some()
        {
            return CheckpointStatus::Checkpointed;
        }

        // Not checkpointed until burnt; anything short of Burnt is the
        // burn flow's answer, passed through unchanged.
        let burn = self.resolve_burn(tx_hash).await;
        if burn != BurnStatus::Burnt {
            return CheckpointStatus::Burn(burn);
        }

        // The receipt tells us which child chain block to ask about.
        let Some(receipt) = self.fetch_receipt(ChainScope::Child, tx_hash).await else {
            return CheckpointStatus::Burn(BurnStatus::Burnt);
        };
        let Some(block_number) = receipt.block_number else {
            return CheckpointStatus::Burn(BurnStatus::Burnt);
        };

        match self
            .checkpoints()
            .is_checkpointed(U256::from(block_number.as_u64()))
            .await
        {
            Ok(true) => {
                let status = CheckpointStatus::Checkpointed;
                self.persist(ChainScope::Child, tx_hash, status.code(), status.message())
                    .await;
                status
            }
            Ok(false) => CheckpointStatus::Burn(BurnStatus::Burnt),
            Err(e) => {
                warn!(
                    "[StatusResolver] checkpoint lookup failed for {:?}: {:?}",
                    tx_hash, e
                );
                self.note_upstream_error("checkpoint");
                CheckpointStatus::Burn(BurnStatus::Burnt)
            }
        }
    }
}
