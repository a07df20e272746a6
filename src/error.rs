// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    // The referenced transaction does not exist
    TxNotFound,
    // Transient chain RPC error
    TransientProviderError(String),
    // Chain RPC error
    ProviderError(String),
    // Contract event subscription error
    SubscriptionError(String),
    // Sibling micro service unreachable or answered non-200
    PeerServiceError(String),
    // Sibling micro service answered with an undecodable body
    PeerResponseError(String),
    // Storage Error
    StorageError(String),
    // Configuration Error
    ConfigError(String),
    // Uncategorized error
    Generic(String),
}

impl TrackerError {
    /// Returns a short string identifying the error type for metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            TrackerError::TxNotFound => "tx_not_found",
            TrackerError::TransientProviderError(_) => "transient_provider_error",
            TrackerError::ProviderError(_) => "provider_error",
            TrackerError::SubscriptionError(_) => "subscription_error",
            TrackerError::PeerServiceError(_) => "peer_service_error",
            TrackerError::PeerResponseError(_) => "peer_response_error",
            TrackerError::StorageError(_) => "storage_error",
            TrackerError::ConfigError(_) => "config_error",
            TrackerError::Generic(_) => "generic",
        }
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
