// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Background poller for the child chain's `lastStateId`.
//!
//! State sync assigns every deposit a monotonically increasing id; once the
//! child chain's state receiver reports an id at or past the deposit's, the
//! fund has arrived. The tracker wakes every few minutes, reads the contract
//! and keeps the largest value it has seen.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, U256};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::abi::StateReceiver;
use crate::error::{TrackerError, TrackerResult};
use crate::metrics::TrackerMetrics;

/// The deposit flow's oracle: the last state id known to have reached the
/// child chain. Served by the in-process tracker or by the state-id sibling
/// over HTTP.
#[async_trait]
pub trait StateIdOracle: Send + Sync {
    async fn last_state_id(&self) -> TrackerResult<U256>;
}

/// Where the id is read from (the state receiver contract in production).
#[async_trait]
pub trait StateIdSource: Send + Sync {
    async fn read_last_state_id(&self) -> TrackerResult<U256>;
}

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3 * 60);

pub struct StateIdTracker {
    last_state_id: Mutex<U256>,
    poll_interval: Duration,
    metrics: Arc<TrackerMetrics>,
}

impl StateIdTracker {
    pub fn new(metrics: Arc<TrackerMetrics>) -> Self {
        Self::with_poll_interval(metrics, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(metrics: Arc<TrackerMetrics>, poll_interval: Duration) -> Self {
        Self {
            last_state_id: Mutex::new(U256::zero()),
            poll_interval,
            metrics,
        }
    }

    async fn update(&self, source: &dyn StateIdSource) {
        let id = match source.read_last_state_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!("[StateIdTracker] Failed to read lastStateId: {:?}", e);
                return;
            }
        };

        let mut current = self.last_state_id.lock().await;
        // The id never goes backwards; a smaller read means a lagging node.
        if *current < id {
            *current = id;
            self.metrics
                .last_synced_state_id
                .set(id.min(U256::from(i64::MAX as u64)).as_u64() as i64);
            info!("[StateIdTracker] Updated lastStateId: {}", id);
        }
    }

    /// Polls until cancelled. An individual read failure is logged and
    /// skipped; the previous value keeps serving reads.
    pub async fn run(self: Arc<Self>, source: Arc<dyn StateIdSource>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[StateIdTracker] Cancelled, shutting down");
                    return;
                }
                _ = interval.tick() => {
                    self.update(source.as_ref()).await;
                }
            }
        }
    }
}

#[async_trait]
impl StateIdOracle for StateIdTracker {
    async fn last_state_id(&self) -> TrackerResult<U256> {
        Ok(*self.last_state_id.lock().await)
    }
}

/// State-id source backed by the state receiver contract on the child chain.
pub struct EthStateIdSource {
    contract: StateReceiver<Provider<Http>>,
}

impl EthStateIdSource {
    pub fn new(address: Address, provider: Arc<Provider<Http>>) -> Self {
        Self {
            contract: StateReceiver::new(address, provider),
        }
    }
}

#[async_trait]
impl StateIdSource for EthStateIdSource {
    async fn read_last_state_id(&self) -> TrackerResult<U256> {
        self.contract
            .last_state_id()
            .call()
            .await
            .map_err(|e| TrackerError::ProviderError(format!("lastStateId: {e}")))
    }
}
