// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Keeps the "last checkpointed child block range" fresh.
//!
//! Primary signal is the `NewHeaderBlock` subscription on the root chain
//! checkpoint manager; a 30-minute fallback poll re-reads the range from the
//! chain whenever no event arrives inside the window. A dropped subscription
//! is re-established in-process with exponential backoff; only once that
//! budget is exhausted does the run loop give up and let the node escalate
//! (the external supervisor restarts the process and we subscribe afresh).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::contract::EthLogDecode;
use ethers::providers::{Middleware, Provider, Ws};
use ethers::types::{Address, Filter, U256};
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::abi::{new_header_block_topic, CheckpointManager, NewHeaderBlockFilter};
use crate::error::{TrackerError, TrackerResult};
use crate::metrics::TrackerMetrics;
use crate::retry_with_max_elapsed_time;

/// Inclusive child chain block range covered by the most recent checkpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckpointRange {
    pub start: U256,
    pub end: U256,
}

/// Answers "is this child chain block covered by a checkpoint yet". The
/// checkpoint status flow consumes this either from the in-process tracker
/// or over HTTP from a sibling node.
#[async_trait]
pub trait CheckpointOracle: Send + Sync {
    async fn is_checkpointed(&self, block_number: U256) -> TrackerResult<bool>;
}

/// Where checkpoint information comes from: a current-range read for startup
/// and the fallback poll, and an event subscription for the push path. The
/// returned channel closing means the subscription died.
#[async_trait]
pub trait CheckpointSource: Send + Sync {
    async fn last_checkpointed_block(&self) -> TrackerResult<U256>;

    async fn subscribe(&self) -> TrackerResult<mpsc::Receiver<CheckpointRange>>;
}

/// How long the tracker may wait for a checkpoint event before reading the
/// range from the chain directly.
const DEFAULT_FALLBACK_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Re-subscription backoff budget before the run loop escalates.
const SUBSCRIBE_RETRY_BUDGET: Duration = Duration::from_secs(300);

const INITIAL_READ_RETRY_BUDGET: Duration = Duration::from_secs(60);

pub struct CheckpointRangeTracker {
    range: Mutex<CheckpointRange>,
    fallback_interval: Duration,
    metrics: Arc<TrackerMetrics>,
}

impl CheckpointRangeTracker {
    pub fn new(metrics: Arc<TrackerMetrics>) -> Self {
        Self::with_fallback_interval(metrics, DEFAULT_FALLBACK_INTERVAL)
    }

    pub fn with_fallback_interval(metrics: Arc<TrackerMetrics>, fallback_interval: Duration) -> Self {
        Self {
            range: Mutex::new(CheckpointRange::default()),
            fallback_interval,
            metrics,
        }
    }

    pub async fn snapshot(&self) -> CheckpointRange {
        *self.range.lock().await
    }

    pub async fn covers(&self, block_number: U256) -> bool {
        block_number <= self.range.lock().await.end
    }

    pub(crate) async fn set_range(&self, range: CheckpointRange) {
        *self.range.lock().await = range;
        self.metrics.last_checkpointed_block.set(gauge_value(range.end));
    }

    async fn set_end(&self, end: U256) {
        self.range.lock().await.end = end;
        self.metrics.last_checkpointed_block.set(gauge_value(end));
    }

    /// Refreshes `end` straight from the chain; used at startup, by the
    /// fallback poll and right after a re-subscribe (to catch up on events
    /// missed while detached).
    async fn refresh_from_chain(&self, source: &dyn CheckpointSource) {
        match source.last_checkpointed_block().await {
            Ok(end) => {
                self.set_end(end).await;
                info!(
                    "[CheckpointTracker] Fetched last checkpointed block number [ {} ]",
                    end
                );
            }
            Err(e) => {
                warn!(
                    "[CheckpointTracker] Failed to fetch last checkpointed block number: {:?}",
                    e
                );
            }
        }
    }

    /// Runs the update loop until cancelled. Returns `Err` only when the
    /// event subscription could not be re-established within the backoff
    /// budget: the caller treats that as fatal.
    pub async fn run(
        self: Arc<Self>,
        source: Arc<dyn CheckpointSource>,
        cancel: CancellationToken,
    ) -> TrackerResult<()> {
        // First read, during initialization.
        match retry_with_max_elapsed_time!(
            source.last_checkpointed_block(),
            INITIAL_READ_RETRY_BUDGET
        ) {
            Ok(Ok(end)) => {
                self.set_end(end).await;
                info!(
                    "[CheckpointTracker] Fetched last checkpointed block number [ {} ]",
                    end
                );
            }
            _ => warn!("[CheckpointTracker] Initial checkpointed block read failed, starting at 0"),
        }

        'subscription: loop {
            let mut events = match retry_with_max_elapsed_time!(
                source.subscribe(),
                SUBSCRIBE_RETRY_BUDGET
            ) {
                Ok(Ok(events)) => events,
                Ok(Err(e)) | Err(e) => {
                    return Err(TrackerError::SubscriptionError(format!(
                        "checkpoint subscription could not be established: {:?}",
                        e
                    )));
                }
            };
            info!("[CheckpointTracker] Subscribed to checkpoint submissions");
            self.refresh_from_chain(source.as_ref()).await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("[CheckpointTracker] Cancelled, shutting down");
                        return Ok(());
                    }
                    maybe_event = events.recv() => {
                        match maybe_event {
                            Some(range) => {
                                self.set_range(range).await;
                                self.metrics.checkpoint_events.inc();
                                info!(
                                    "[CheckpointTracker] Updated checkpoint info: {} <-> {}",
                                    range.start, range.end
                                );
                            }
                            None => {
                                warn!("[CheckpointTracker] Subscription dropped, re-subscribing");
                                continue 'subscription;
                            }
                        }
                    }
                    // No checkpoint info for a whole window; the node may
                    // have silently stopped delivering events, so read the
                    // range from the chain directly.
                    _ = tokio::time::sleep(self.fallback_interval) => {
                        self.metrics.checkpoint_fallback_polls.inc();
                        self.refresh_from_chain(source.as_ref()).await;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl CheckpointOracle for CheckpointRangeTracker {
    async fn is_checkpointed(&self, block_number: U256) -> TrackerResult<bool> {
        Ok(self.covers(block_number).await)
    }
}

fn gauge_value(value: U256) -> i64 {
    value.min(U256::from(i64::MAX as u64)).as_u64() as i64
}

/// Checkpoint source backed by the root chain: `getLastChildBlock` for
/// reads, a websocket log subscription on `NewHeaderBlock` for events.
pub struct EthCheckpointSource {
    provider: Arc<Provider<Ws>>,
    contract_address: Address,
}

impl EthCheckpointSource {
    pub async fn connect(ws_url: &str, contract_address: Address) -> anyhow::Result<Self> {
        let provider = Provider::<Ws>::connect(ws_url).await?;
        Ok(Self {
            provider: Arc::new(provider),
            contract_address,
        })
    }
}

#[async_trait]
impl CheckpointSource for EthCheckpointSource {
    async fn last_checkpointed_block(&self) -> TrackerResult<U256> {
        let contract = CheckpointManager::new(self.contract_address, self.provider.clone());
        contract
            .get_last_child_block()
            .call()
            .await
            .map_err(|e| TrackerError::ProviderError(format!("getLastChildBlock: {e}")))
    }

    async fn subscribe(&self) -> TrackerResult<mpsc::Receiver<CheckpointRange>> {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (ready_tx, ready_rx) = oneshot::channel();
        let provider = self.provider.clone();
        let filter = Filter::new()
            .address(self.contract_address)
            .topic0(new_header_block_topic());

        tokio::spawn(async move {
            let mut stream = match provider.subscribe_logs(&filter).await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(TrackerError::SubscriptionError(e.to_string())));
                    return;
                }
            };

            while let Some(log) = stream.next().await {
                let raw = ethers::abi::RawLog::from(log);
                match NewHeaderBlockFilter::decode_log(&raw) {
                    Ok(event) => {
                        let range = CheckpointRange {
                            start: event.start,
                            end: event.end,
                        };
                        if event_tx.send(range).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("[CheckpointTracker] Undecodable NewHeaderBlock log: {e}");
                    }
                }
            }
            // Stream exhausted: the websocket subscription is gone. Dropping
            // event_tx closes the channel, which the tracker reads as the
            // signal to re-subscribe.
        });

        ready_rx
            .await
            .map_err(|_| TrackerError::SubscriptionError("subscription task died".to_string()))??;
        Ok(event_rx)
    }
}
