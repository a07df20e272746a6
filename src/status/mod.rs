// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-flow transaction status resolvers.
//!
//! Each flow (approval, deposit, burn, checkpoint, pos, exit, plasma
//! confirm/exit) owns its own status code space: the same integer means
//! different things in different flows, so every flow models its codes as a
//! flow-local enum and only the wire-level [`TransactionState`] carries raw
//! integers. Resolvers never return errors: every failed chain or peer
//! lookup degrades to the most conservative status the flow knows, so
//! polling clients see "no progress yet" rather than a 5xx.

pub mod approval;
pub mod burn;
pub mod checkpoint;
pub mod deposit;
pub mod exit;
pub mod plasma_confirm;
pub mod plasma_exit;
pub mod pos_burn;
pub mod withdraw;

use std::sync::Arc;

use ethers::types::{Log, TransactionReceipt, TxHash, H256};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chain_client::{ExitMarker, ReceiptSource};
use crate::checkpoint_tracker::CheckpointOracle;
use crate::metrics::TrackerMetrics;
use crate::peer_client::ExitOracle;
use crate::state_id::StateIdOracle;
use crate::store::{CachedStatus, ChainScope, StatusStore};

pub use withdraw::{WithdrawTransaction, WithdrawTransactionStatus};

/// Current state of a tracked transaction. The hash itself is not part of
/// the value; response maps are keyed by it. Immutable: every resolution
/// step produces a fresh instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionState {
    pub code: i32,
    #[serde(rename = "msg")]
    pub message: String,
}

impl TransactionState {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<CachedStatus> for TransactionState {
    fn from(cached: CachedStatus) -> Self {
        Self {
            code: cached.code,
            message: cached.message,
        }
    }
}

/// One resolver instance serves every flow; the flow methods live in the
/// sibling modules. All collaborators are injected so tests can count calls.
pub struct StatusResolver {
    root_chain: Arc<dyn ReceiptSource>,
    child_chain: Arc<dyn ReceiptSource>,
    store: Arc<dyn StatusStore>,
    checkpoints: Arc<dyn CheckpointOracle>,
    state_ids: Arc<dyn StateIdOracle>,
    exits: Arc<dyn ExitOracle>,
    exit_nft: Arc<dyn ExitMarker>,
    metrics: Arc<TrackerMetrics>,
}

impl StatusResolver {
    pub fn new(
        root_chain: Arc<dyn ReceiptSource>,
        child_chain: Arc<dyn ReceiptSource>,
        store: Arc<dyn StatusStore>,
        checkpoints: Arc<dyn CheckpointOracle>,
        state_ids: Arc<dyn StateIdOracle>,
        exits: Arc<dyn ExitOracle>,
        exit_nft: Arc<dyn ExitMarker>,
        metrics: Arc<TrackerMetrics>,
    ) -> Self {
        Self {
            root_chain,
            child_chain,
            store,
            checkpoints,
            state_ids,
            exits,
            exit_nft,
            metrics,
        }
    }

    /// Returns the cached status iff one exists and its code is in `stable`.
    /// A cache read failure is treated as a miss: the flow falls through to
    /// live sources.
    pub(crate) async fn cached_status(
        &self,
        scope: ChainScope,
        tx_hash: TxHash,
        stable: &[i32],
    ) -> Option<CachedStatus> {
        match self.store.get(scope, tx_hash).await {
            Ok(Some(cached)) if stable.contains(&cached.code) => {
                self.metrics
                    .status_cache_hits
                    .with_label_values(&[scope_label(scope)])
                    .inc();
                Some(cached)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(
                    "[StatusResolver] cache read failed for {:?}: {:?}",
                    tx_hash, e
                );
                self.metrics
                    .upstream_errors
                    .with_label_values(&["store"])
                    .inc();
                None
            }
        }
    }

    /// Best-effort cache write. Only called with codes the owning flow has
    /// classified as stable; a write failure costs a re-derivation on the
    /// next request, nothing more.
    pub(crate) async fn persist(
        &self,
        scope: ChainScope,
        tx_hash: TxHash,
        code: i32,
        message: &str,
    ) {
        match self.store.put(scope, tx_hash, code, message).await {
            Ok(()) => {
                self.metrics
                    .status_cache_writes
                    .with_label_values(&[scope_label(scope)])
                    .inc();
            }
            Err(e) => {
                warn!(
                    "[StatusResolver] cache write failed for {:?} (code {}): {:?}",
                    tx_hash, code, e
                );
                self.metrics
                    .upstream_errors
                    .with_label_values(&["store"])
                    .inc();
            }
        }
    }

    /// Fetches the receipt from the chain the scope points at. `None` covers
    /// both "still pending" and "rpc unreachable": the flows treat either
    /// as no progress.
    pub(crate) async fn fetch_receipt(
        &self,
        scope: ChainScope,
        tx_hash: TxHash,
    ) -> Option<TransactionReceipt> {
        let (chain, label) = match scope {
            ChainScope::Root => (&self.root_chain, "root"),
            ChainScope::Child => (&self.child_chain, "child"),
        };
        match chain.transaction_receipt(tx_hash).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(
                    "[StatusResolver] {} receipt lookup failed for {:?}: {:?}",
                    label, tx_hash, e
                );
                self.metrics
                    .upstream_errors
                    .with_label_values(&[label])
                    .inc();
                None
            }
        }
    }

    pub(crate) fn checkpoints(&self) -> &dyn CheckpointOracle {
        self.checkpoints.as_ref()
    }

    pub(crate) fn state_ids(&self) -> &dyn StateIdOracle {
        self.state_ids.as_ref()
    }

    pub(crate) fn exits(&self) -> &dyn ExitOracle {
        self.exits.as_ref()
    }

    pub(crate) fn exit_nft(&self) -> &dyn ExitMarker {
        self.exit_nft.as_ref()
    }

    pub(crate) fn note_upstream_error(&self, source: &str) {
        self.metrics
            .upstream_errors
            .with_label_values(&[source])
            .inc();
    }
}

fn scope_label(scope: ChainScope) -> &'static str {
    match scope {
        ChainScope::Root => "root",
        ChainScope::Child => "child",
    }
}

/// Status field is 0 for a transaction whose execution reverted.
pub(crate) fn receipt_failed(receipt: &TransactionReceipt) -> bool {
    receipt.status.map(|s| s.as_u64()) == Some(0)
}

/// Finds the first log entry whose topic 0 matches, the way flows locate
/// their marker events (state sync, exit started) inside a receipt.
pub(crate) fn find_log_by_topic(receipt: &TransactionReceipt, topic: H256) -> Option<&Log> {
    receipt
        .logs
        .iter()
        .find(|log| log.topics.first() == Some(&topic))
}
