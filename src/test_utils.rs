// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Mock collaborators for resolver tests. Each mock counts its calls so
//! tests can assert that cached stable states short-circuit chain and peer
//! traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::types::{Log, TransactionReceipt, TxHash, H256, U256};

use crate::abi::{exit_started_topic, state_synced_topic};
use crate::chain_client::{ExitMarker, ReceiptSource};
use crate::checkpoint_tracker::CheckpointOracle;
use crate::error::{TrackerError, TrackerResult};
use crate::metrics::TrackerMetrics;
use crate::peer_client::{ExitEligibility, ExitOracle};
use crate::state_id::StateIdOracle;
use crate::status::StatusResolver;
use crate::store::{CachedStatus, ChainScope, StatusStore};

pub fn init_tracing_for_testing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("info")
        .try_init();
}

pub fn successful_receipt(block_number: u64) -> TransactionReceipt {
    TransactionReceipt {
        status: Some(1.into()),
        block_number: Some(block_number.into()),
        ..Default::default()
    }
}

pub fn failed_receipt() -> TransactionReceipt {
    TransactionReceipt {
        status: Some(0.into()),
        ..Default::default()
    }
}

pub fn failed_receipt_with_logs(logs: Vec<Log>) -> TransactionReceipt {
    TransactionReceipt {
        status: Some(0.into()),
        logs,
        ..Default::default()
    }
}

/// Successful deposit receipt carrying a StateSynced log with the given
/// state id in its first indexed topic.
pub fn receipt_with_state_sync_log(block_number: u64, state_id: u64) -> TransactionReceipt {
    let mut receipt = successful_receipt(block_number);
    receipt.logs = vec![Log {
        topics: vec![state_synced_topic(), H256::from_low_u64_be(state_id)],
        ..Default::default()
    }];
    receipt
}

/// Successful confirm receipt carrying an ExitStarted log with the given
/// exit NFT id in its second indexed topic.
pub fn receipt_with_exit_started_log(block_number: u64, exit_id: u64) -> TransactionReceipt {
    let mut receipt = successful_receipt(block_number);
    receipt.logs = vec![Log {
        topics: vec![
            exit_started_topic(),
            H256::zero(),
            H256::from_low_u64_be(exit_id),
        ],
        ..Default::default()
    }];
    receipt
}

pub struct MockReceiptSource {
    receipts: Mutex<HashMap<TxHash, TransactionReceipt>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockReceiptSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            receipts: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn insert(&self, tx_hash: TxHash, receipt: TransactionReceipt) {
        self.receipts.lock().unwrap().insert(tx_hash, receipt);
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReceiptSource for MockReceiptSource {
    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> TrackerResult<Option<TransactionReceipt>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TrackerError::ProviderError("mock rpc down".to_string()));
        }
        Ok(self.receipts.lock().unwrap().get(&tx_hash).cloned())
    }
}

pub struct MemoryStatusStore {
    root: Mutex<HashMap<TxHash, (i32, String)>>,
    child: Mutex<HashMap<TxHash, (i32, String)>>,
    puts: AtomicUsize,
}

impl MemoryStatusStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            root: Mutex::new(HashMap::new()),
            child: Mutex::new(HashMap::new()),
            puts: AtomicUsize::new(0),
        })
    }

    fn table(&self, scope: ChainScope) -> &Mutex<HashMap<TxHash, (i32, String)>> {
        match scope {
            ChainScope::Root => &self.root,
            ChainScope::Child => &self.child,
        }
    }

    pub fn code(&self, scope: ChainScope, tx_hash: TxHash) -> Option<i32> {
        self.table(scope)
            .lock()
            .unwrap()
            .get(&tx_hash)
            .map(|(code, _)| *code)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn get(&self, scope: ChainScope, tx_hash: TxHash) -> TrackerResult<Option<CachedStatus>> {
        Ok(self
            .table(scope)
            .lock()
            .unwrap()
            .get(&tx_hash)
            .map(|(code, message)| CachedStatus {
                tx_hash,
                code: *code,
                message: message.clone(),
            }))
    }

    async fn put(
        &self,
        scope: ChainScope,
        tx_hash: TxHash,
        code: i32,
        message: &str,
    ) -> TrackerResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.table(scope)
            .lock()
            .unwrap()
            .insert(tx_hash, (code, message.to_string()));
        Ok(())
    }
}

pub struct MockCheckpointOracle {
    checkpointed_up_to: Mutex<U256>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockCheckpointOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            checkpointed_up_to: Mutex::new(U256::zero()),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_checkpointed_up_to(&self, block: u64) {
        *self.checkpointed_up_to.lock().unwrap() = U256::from(block);
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckpointOracle for MockCheckpointOracle {
    async fn is_checkpointed(&self, block_number: U256) -> TrackerResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TrackerError::PeerServiceError(
                "mock checkpoint service down".to_string(),
            ));
        }
        Ok(block_number <= *self.checkpointed_up_to.lock().unwrap())
    }
}

pub struct MockStateIdOracle {
    value: Mutex<Option<U256>>,
    calls: AtomicUsize,
}

impl MockStateIdOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(Some(U256::zero())),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_value(&self, value: u64) {
        *self.value.lock().unwrap() = Some(U256::from(value));
    }

    pub fn set_unavailable(&self) {
        *self.value.lock().unwrap() = None;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateIdOracle for MockStateIdOracle {
    async fn last_state_id(&self) -> TrackerResult<U256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let value = *self.value.lock().unwrap();
        value
            .ok_or_else(|| TrackerError::PeerServiceError("mock state-id service down".to_string()))
    }
}

pub struct MockExitOracle {
    processed: AtomicBool,
    eligibility: Mutex<ExitEligibility>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockExitOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            processed: AtomicBool::new(false),
            eligibility: Mutex::new(ExitEligibility::ReadyToExit),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_processed(&self, processed: bool) {
        self.processed.store(processed, Ordering::SeqCst);
    }

    pub fn set_eligibility(&self, eligibility: ExitEligibility) {
        *self.eligibility.lock().unwrap() = eligibility;
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExitOracle for MockExitOracle {
    async fn is_exit_processed(&self, _tx_hash: TxHash) -> TrackerResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TrackerError::PeerServiceError(
                "mock exit checker down".to_string(),
            ));
        }
        Ok(self.processed.load(Ordering::SeqCst))
    }

    async fn exit_time(
        &self,
        _burn_tx_hash: TxHash,
        _confirm_tx_hash: TxHash,
    ) -> TrackerResult<ExitEligibility> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TrackerError::PeerServiceError(
                "mock exit checker down".to_string(),
            ));
        }
        Ok(self.eligibility.lock().unwrap().clone())
    }
}

pub struct MockExitMarker {
    exists: AtomicBool,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockExitMarker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            exists: AtomicBool::new(true),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_exists(&self, exists: bool) {
        self.exists.store(exists, Ordering::SeqCst);
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExitMarker for MockExitMarker {
    async fn exists(&self, _exit_id: U256) -> TrackerResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TrackerError::ProviderError(
                "mock nft lookup failed".to_string(),
            ));
        }
        Ok(self.exists.load(Ordering::SeqCst))
    }
}

pub struct ResolverFixture {
    pub root: Arc<MockReceiptSource>,
    pub child: Arc<MockReceiptSource>,
    pub store: Arc<MemoryStatusStore>,
    pub checkpoints: Arc<MockCheckpointOracle>,
    pub state_ids: Arc<MockStateIdOracle>,
    pub exits: Arc<MockExitOracle>,
    pub exit_nft: Arc<MockExitMarker>,
    pub resolver: Arc<StatusResolver>,
}

pub fn resolver_fixture() -> ResolverFixture {
    let root = MockReceiptSource::new();
    let child = MockReceiptSource::new();
    let store = MemoryStatusStore::new();
    let checkpoints = MockCheckpointOracle::new();
    let state_ids = MockStateIdOracle::new();
    let exits = MockExitOracle::new();
    let exit_nft = MockExitMarker::new();

    let resolver = Arc::new(StatusResolver::new(
        root.clone(),
        child.clone(),
        store.clone(),
        checkpoints.clone(),
        state_ids.clone(),
        exits.clone(),
        exit_nft.clone(),
        TrackerMetrics::new_for_testing(),
    ));

    ResolverFixture {
        root,
        child,
        store,
        checkpoints,
        state_ids,
        exits,
        exit_nft,
        resolver,
    }
}
