// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Read-only chain access: transaction receipts per chain, plus the exit NFT
//! view call used by the plasma confirm flow.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, TransactionReceipt, TxHash, U256};
use tracing::info;

use crate::abi::ExitNft;
use crate::error::{TrackerError, TrackerResult};

/// Receipt lookups against one chain. A receipt only exists once the
/// transaction left the mempool, so `Ok(None)` means "still pending".
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    async fn transaction_receipt(&self, tx_hash: TxHash)
        -> TrackerResult<Option<TransactionReceipt>>;
}

/// Existence check on the NFT minted while a plasma exit is in flight; the
/// token disappearing is the on-chain signal that the exit was processed.
#[async_trait]
pub trait ExitMarker: Send + Sync {
    async fn exists(&self, exit_id: U256) -> TrackerResult<bool>;
}

pub struct ChainClient {
    provider: Arc<Provider<Http>>,
    chain_name: &'static str,
}

impl ChainClient {
    pub async fn new(provider_url: &str, chain_name: &'static str) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(provider_url)?;
        let chain_id = provider.get_chainid().await?;
        info!(
            "[{}] Connected to rpc {} (chain_id={})",
            chain_name, provider_url, chain_id
        );
        Ok(Self {
            provider: Arc::new(provider),
            chain_name,
        })
    }

    pub fn provider(&self) -> Arc<Provider<Http>> {
        self.provider.clone()
    }

    pub fn chain_name(&self) -> &'static str {
        self.chain_name
    }
}

#[async_trait]
impl ReceiptSource for ChainClient {
    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> TrackerResult<Option<TransactionReceipt>> {
        self.provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| {
                TrackerError::ProviderError(format!(
                    "{}: get_transaction_receipt({:?}): {e}",
                    self.chain_name, tx_hash
                ))
            })
    }
}

pub struct ExitNftClient {
    contract: ExitNft<Provider<Http>>,
}

impl ExitNftClient {
    pub fn new(address: Address, provider: Arc<Provider<Http>>) -> Self {
        Self {
            contract: ExitNft::new(address, provider),
        }
    }
}

#[async_trait]
impl ExitMarker for ExitNftClient {
    async fn exists(&self, exit_id: U256) -> TrackerResult<bool> {
        self.contract
            .exists(exit_id)
            .call()
            .await
            .map_err(|e| TrackerError::ProviderError(format!("ExitNFT.exists({exit_id}): {e}")))
    }
}
