// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! HTTP adapters for the sibling micro services: the checkpoint tracker, the
//! exit checker and the state-id manager. Every transport, non-200 and
//! decode failure maps to a `TrackerError`; the resolvers absorb those into
//! conservative statuses instead of surfacing them.

use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{TxHash, U256};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::checkpoint_tracker::CheckpointOracle;
use crate::error::{TrackerError, TrackerResult};
use crate::state_id::StateIdOracle;

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// `{code, msg}` answer shared by the checkpoint and exit-checker services.
#[derive(Debug, Deserialize)]
struct PeerStatus {
    code: i32,
    msg: String,
}

/// Whether a plasma withdraw has cleared its challenge period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitEligibility {
    ReadyToExit,
    /// Seconds remaining before `processExits` can be called, as the service
    /// reported it (a decimal string on the wire).
    ExitableIn(String),
}

/// Exit-side lookups served by the exit-checker sibling. There is no
/// in-process counterpart: the challenge-period math lives in that service.
#[async_trait]
pub trait ExitOracle: Send + Sync {
    async fn is_exit_processed(&self, tx_hash: TxHash) -> TrackerResult<bool>;

    async fn exit_time(
        &self,
        burn_tx_hash: TxHash,
        confirm_tx_hash: TxHash,
    ) -> TrackerResult<ExitEligibility>;
}

fn peer_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .expect("building reqwest client")
}

async fn decode_peer_status(response: reqwest::Response) -> TrackerResult<PeerStatus> {
    if !response.status().is_success() {
        return Err(TrackerError::PeerServiceError(format!(
            "peer answered {}",
            response.status()
        )));
    }
    response
        .json::<PeerStatus>()
        .await
        .map_err(|e| TrackerError::PeerResponseError(e.to_string()))
}

/// Client of the checkpoint tracker service, for deployments where the
/// range tracker runs out of process.
pub struct CheckpointServiceClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct CheckpointLookupRequest {
    #[serde(rename = "blockNumber")]
    block_number: String,
}

impl CheckpointServiceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: peer_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CheckpointOracle for CheckpointServiceClient {
    async fn is_checkpointed(&self, block_number: U256) -> TrackerResult<bool> {
        let response = self
            .client
            .post(&self.base_url)
            .json(&CheckpointLookupRequest {
                block_number: block_number.to_string(),
            })
            .send()
            .await
            .map_err(|e| TrackerError::PeerServiceError(e.to_string()))?;

        let status = decode_peer_status(response).await?;
        Ok(status.code != 0)
    }
}

/// Client of the exit checker service.
pub struct ExitCheckerClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct ExitProcessedRequest {
    #[serde(rename = "txHash")]
    tx_hash: TxHash,
}

#[derive(Serialize)]
struct ExitTimeRequest {
    #[serde(rename = "burnTxHash")]
    burn_tx_hash: TxHash,
    #[serde(rename = "confirmTxHash")]
    confirm_tx_hash: TxHash,
}

impl ExitCheckerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: peer_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ExitOracle for ExitCheckerClient {
    async fn is_exit_processed(&self, tx_hash: TxHash) -> TrackerResult<bool> {
        let response = self
            .client
            .post(&self.base_url)
            .json(&ExitProcessedRequest { tx_hash })
            .send()
            .await
            .map_err(|e| TrackerError::PeerServiceError(e.to_string()))?;

        let status = decode_peer_status(response).await?;
        Ok(status.code != 0)
    }

    async fn exit_time(
        &self,
        burn_tx_hash: TxHash,
        confirm_tx_hash: TxHash,
    ) -> TrackerResult<ExitEligibility> {
        let response = self
            .client
            .post(format!("{}/exit-time", self.base_url))
            .json(&ExitTimeRequest {
                burn_tx_hash,
                confirm_tx_hash,
            })
            .send()
            .await
            .map_err(|e| TrackerError::PeerServiceError(e.to_string()))?;

        let status = decode_peer_status(response).await?;
        if status.code == 0 {
            // msg carries the remaining challenge period in seconds
            Ok(ExitEligibility::ExitableIn(status.msg))
        } else {
            Ok(ExitEligibility::ReadyToExit)
        }
    }
}

/// Client of the state-id manager service.
pub struct StateIdServiceClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct LastStateIdResponse {
    id: String,
}

impl StateIdServiceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: peer_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StateIdOracle for StateIdServiceClient {
    async fn last_state_id(&self) -> TrackerResult<U256> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| TrackerError::PeerServiceError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TrackerError::PeerServiceError(format!(
                "peer answered {}",
                response.status()
            )));
        }

        let body: LastStateIdResponse = response
            .json()
            .await
            .map_err(|e| TrackerError::PeerResponseError(e.to_string()))?;

        U256::from_dec_str(&body.id)
            .map_err(|e| TrackerError::PeerResponseError(format!("bad state id {:?}: {e}", body.id)))
    }
}
