// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bounded concurrent batch resolution.
//!
//! Every batch endpoint runs through the same shape: validate the payload
//! size, dedupe the inputs, spawn one task per unique input, join them all,
//! and merge the per-task results into one map after the join. On top of
//! the raw results, a fixed-priority action label and a pending count are
//! derived from flow-specific code sets.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::error;

pub const ACTION_REQUIRED: &str = "Action Required";
pub const TX_IN_PROGRESS: &str = "Transaction In Progress";

/// Payload rejected before any resolution work starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadError {
    Malformed,
    Empty,
    Heavy,
}

impl PayloadError {
    pub fn message(&self) -> &'static str {
        match self {
            PayloadError::Malformed => "Bad Payload",
            PayloadError::Empty => "Empty Payload",
            PayloadError::Heavy => "Heavy Payload",
        }
    }
}

/// How many tx hashes one batch request may carry.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PayloadBounds {
    #[serde(default = "default_min_payload")]
    pub min: usize,
    #[serde(default = "default_max_payload")]
    pub max: usize,
}

fn default_min_payload() -> usize {
    1
}

fn default_max_payload() -> usize {
    10
}

impl Default for PayloadBounds {
    fn default() -> Self {
        Self {
            min: default_min_payload(),
            max: default_max_payload(),
        }
    }
}

impl PayloadBounds {
    pub fn check(&self, len: usize) -> Result<(), PayloadError> {
        if len < self.min {
            return Err(PayloadError::Empty);
        }
        if len > self.max {
            return Err(PayloadError::Heavy);
        }
        Ok(())
    }
}

/// Drops duplicates while preserving first-seen order, so a caller repeating
/// the same hash `n` times costs one resolution, not `n`.
pub fn dedup_by_key<T, K, F>(items: &[T], key: F) -> Vec<T>
where
    T: Clone,
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut seen: Vec<K> = Vec::with_capacity(items.len());
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        let k = key(item);
        if !seen.contains(&k) {
            seen.push(k);
            unique.push(item.clone());
        }
    }
    unique
}

/// Spawns one task per item and blocks until every task has completed, then
/// merges the `(key, value)` results into a map. Items resolving to `None`
/// get no entry. There is no per-task timeout: one hung upstream call stalls
/// the whole join.
pub async fn resolve_batch<I, K, V, F, Fut>(items: Vec<I>, resolve: F) -> HashMap<K, V>
where
    I: Send + 'static,
    K: Eq + Hash + Send + 'static,
    V: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Option<(K, V)>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for item in items {
        tasks.spawn(resolve(item));
    }

    let mut results = HashMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some((key, value))) => {
                results.insert(key, value);
            }
            Ok(None) => {}
            Err(e) => error!("[Batch] resolver task failed: {e}"),
        }
    }
    results
}

/// The code sets a flow feeds into the action/count aggregation.
#[derive(Clone, Copy, Debug)]
pub struct FlowAggregation {
    pub action_required: &'static [i32],
    pub in_progress: &'static [i32],
    pub pending: &'static [i32],
}

/// Approval batches: only the pending code counts as in progress.
pub const APPROVAL_AGGREGATION: FlowAggregation = FlowAggregation {
    action_required: &[],
    in_progress: &[7],
    pending: &[7],
};

/// Deposit batches: both Pending and En Route are live.
pub const DEPOSIT_AGGREGATION: FlowAggregation = FlowAggregation {
    action_required: &[],
    in_progress: &[1, 4],
    pending: &[1, 4],
};

/// Withdraw batches: Checkpointed and Ready To Exit need the user to act.
pub const WITHDRAW_AGGREGATION: FlowAggregation = FlowAggregation {
    action_required: &[-4, -9],
    in_progress: &[-1, -3, -5, -8, -12],
    pending: &[-1, -3, -4, -5, -8, -9, -12],
};

impl FlowAggregation {
    /// Highest-priority activity the user should take across the batch.
    /// "Action Required" always outranks "Transaction In Progress"; an
    /// all-terminal batch yields an empty label.
    pub fn action<I>(&self, codes: I) -> &'static str
    where
        I: IntoIterator<Item = i32>,
    {
        let mut action = "";
        for code in codes {
            if self.action_required.contains(&code) {
                return ACTION_REQUIRED;
            }
            if self.in_progress.contains(&code) {
                action = TX_IN_PROGRESS;
            }
        }
        action
    }

    pub fn pending_count<I>(&self, codes: I) -> usize
    where
        I: IntoIterator<Item = i32>,
    {
        codes
            .into_iter()
            .filter(|code| self.pending.contains(code))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_payload_bounds() {
        let bounds = PayloadBounds::default();
        assert_eq!(bounds.check(0), Err(PayloadError::Empty));
        assert_eq!(bounds.check(1), Ok(()));
        assert_eq!(bounds.check(10), Ok(()));
        assert_eq!(bounds.check(11), Err(PayloadError::Heavy));
    }

    #[test]
    fn test_dedup_preserves_order() {
        let items = vec![3, 1, 3, 2, 1];
        assert_eq!(dedup_by_key(&items, |v| *v), vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_resolve_batch_joins_every_task() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let results = resolve_batch(vec![1u64, 2, 3], move |item| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Some((item, item * 10))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[&2], 20);
    }

    #[tokio::test]
    async fn test_resolve_batch_skips_none_results() {
        let results = resolve_batch(vec![1u64, 2, 3], |item| async move {
            (item != 2).then_some((item, item))
        })
        .await;
        assert_eq!(results.len(), 2);
        assert!(!results.contains_key(&2));
    }

    #[test]
    fn test_action_required_outranks_in_progress() {
        // An in-progress code after the action-required one must not win.
        let action = WITHDRAW_AGGREGATION.action(vec![-1, -4, -12]);
        assert_eq!(action, ACTION_REQUIRED);

        let action = WITHDRAW_AGGREGATION.action(vec![-1, -12]);
        assert_eq!(action, TX_IN_PROGRESS);

        let action = WITHDRAW_AGGREGATION.action(vec![-10, -11]);
        assert_eq!(action, "");
    }

    #[test]
    fn test_pending_count_ignores_terminal_codes() {
        let count = WITHDRAW_AGGREGATION.pending_count(vec![-1, -4, -10, -11, -9]);
        assert_eq!(count, 3);

        let count = DEPOSIT_AGGREGATION.pending_count(vec![4, 1, 0, 2]);
        assert_eq!(count, 2);
    }
}
