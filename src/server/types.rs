// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Request payloads and response envelopes for the REST surface.

use std::collections::HashMap;

use ethers::types::TxHash;
use serde::{Deserialize, Serialize};

use crate::status::{TransactionState, WithdrawTransactionStatus};

/// An array of tx hashes sent with the request body; the response maps each
/// hash back to its status. Duplicate entries are collapsed server-side so a
/// caller repeating one hash `n` times cannot multiply the work.
#[derive(Clone, Debug, Deserialize)]
pub struct BulkPayload {
    #[serde(rename = "txHashes")]
    pub tx_hashes: Vec<TxHash>,
}

/// One plasma withdraw to check: the child chain burn hash plus the root
/// chain confirm hash it led to.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ExitPair {
    #[serde(rename = "burnTxHash")]
    pub burn_tx_hash: TxHash,
    #[serde(rename = "confirmTxHash")]
    pub confirm_tx_hash: TxHash,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlasmaConfirmPayload {
    #[serde(rename = "txHashes")]
    pub tx_hashes: Vec<ExitPair>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WithdrawPayload {
    #[serde(rename = "withdrawTxObjectArray")]
    pub transactions: Vec<crate::status::WithdrawTransaction>,
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    #[serde(rename = "approvalTxStatus")]
    pub approval_tx_status: HashMap<TxHash, TransactionState>,
    pub action: &'static str,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DepositResponse {
    #[serde(rename = "depositTxStatus")]
    pub deposit_tx_status: HashMap<TxHash, TransactionState>,
    pub action: &'static str,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct WithdrawResponse {
    #[serde(rename = "withdrawTxStatus")]
    pub withdraw_tx_status: HashMap<TxHash, WithdrawTransactionStatus>,
    pub action: &'static str,
    pub count: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CheckpointLookupPayload {
    #[serde(rename = "blockNumber")]
    pub block_number: String,
}

#[derive(Debug, Serialize)]
pub struct CheckpointRangeResponse {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct CheckpointCoveredResponse {
    pub code: i32,
    pub msg: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StateIdResponse {
    pub id: String,
}
