// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, IntCounter, IntCounterVec, IntGauge, Registry,
};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct TrackerMetrics {
    pub(crate) requests_received: IntCounterVec,
    pub(crate) requests_rejected: IntCounterVec,

    pub(crate) status_cache_hits: IntCounterVec,
    pub(crate) status_cache_writes: IntCounterVec,

    pub(crate) upstream_errors: IntCounterVec,

    pub(crate) checkpoint_events: IntCounter,
    pub(crate) checkpoint_fallback_polls: IntCounter,
    pub(crate) last_checkpointed_block: IntGauge,
    pub(crate) last_synced_state_id: IntGauge,
}

impl TrackerMetrics {
    pub fn new(registry: &Registry) -> Arc<Self> {
        Arc::new(Self {
            requests_received: register_int_counter_vec_with_registry!(
                "tracker_requests_received",
                "Total status requests received, by endpoint",
                &["endpoint"],
                registry,
            )
            .unwrap(),
            requests_rejected: register_int_counter_vec_with_registry!(
                "tracker_requests_rejected",
                "Requests rejected before any resolution work, by reason",
                &["reason"],
                registry,
            )
            .unwrap(),
            status_cache_hits: register_int_counter_vec_with_registry!(
                "tracker_status_cache_hits",
                "Resolutions short-circuited by a cached stable status, by scope",
                &["scope"],
                registry,
            )
            .unwrap(),
            status_cache_writes: register_int_counter_vec_with_registry!(
                "tracker_status_cache_writes",
                "Stable statuses persisted to the cache, by scope",
                &["scope"],
                registry,
            )
            .unwrap(),
            upstream_errors: register_int_counter_vec_with_registry!(
                "tracker_upstream_errors",
                "Chain/peer lookups that failed and were degraded, by source",
                &["source"],
                registry,
            )
            .unwrap(),
            checkpoint_events: register_int_counter_with_registry!(
                "tracker_checkpoint_events",
                "Checkpoint submissions received over the event subscription",
                registry,
            )
            .unwrap(),
            checkpoint_fallback_polls: register_int_counter_with_registry!(
                "tracker_checkpoint_fallback_polls",
                "Times the 30-minute fallback poll refreshed the range",
                registry,
            )
            .unwrap(),
            last_checkpointed_block: register_int_gauge_with_registry!(
                "tracker_last_checkpointed_block",
                "End of the most recently observed checkpointed block range",
                registry,
            )
            .unwrap(),
            last_synced_state_id: register_int_gauge_with_registry!(
                "tracker_last_synced_state_id",
                "Last state id observed on the child chain",
                registry,
            )
            .unwrap(),
        })
    }

    pub fn new_for_testing() -> Arc<Self> {
        Self::new(&Registry::new())
    }
}
