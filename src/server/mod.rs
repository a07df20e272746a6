// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! REST API for the deposit & withdraw lifecycle tracker.
//!
//! Batch endpoints validate payload size up front (400 with a one-line
//! `msg`), then always answer 200 with a per-hash state map: an individual
//! hash failing to resolve never fails the batch. When the in-process
//! checkpoint/state-id trackers are wired, their sibling-service-compatible
//! endpoints are served as well, so other nodes can consume this one over
//! HTTP.

pub mod types;

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ethers::types::{TxHash, U256};
use prometheus::{Registry, TextEncoder};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::batch::{
    dedup_by_key, resolve_batch, PayloadBounds, PayloadError, APPROVAL_AGGREGATION,
    DEPOSIT_AGGREGATION, WITHDRAW_AGGREGATION,
};
use crate::checkpoint_tracker::CheckpointRangeTracker;
use crate::metrics::TrackerMetrics;
use crate::state_id::{StateIdOracle, StateIdTracker};
use crate::status::{StatusResolver, TransactionState};
use types::*;

/// Shared state for API handlers
pub struct AppState {
    pub resolver: Arc<StatusResolver>,
    pub bounds: PayloadBounds,
    /// Present when the checkpoint range tracker runs in this process.
    pub checkpoint_tracker: Option<Arc<CheckpointRangeTracker>>,
    /// Present when the state-id tracker runs in this process.
    pub state_id_tracker: Option<Arc<StateIdTracker>>,
    pub metrics: Arc<TrackerMetrics>,
    pub registry: Registry,
}

pub fn run_server(socket_address: SocketAddr, state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("Tracker API listening on {}", socket_address);
        let listener = tokio::net::TcpListener::bind(socket_address).await.unwrap();
        axum::serve(listener, make_router(state).into_make_service())
            .await
            .unwrap();
    })
}

pub(crate) fn make_router(state: Arc<AppState>) -> Router {
    let v1 = Router::new()
        .route("/approval", post(handle_approval))
        .route("/deposit", post(handle_deposit))
        .route("/pos-burn", post(handle_pos_burn))
        // Legacy alias of /pos-burn, kept for older wallet clients.
        .route("/pos-withdraw", post(handle_pos_burn))
        .route("/pos-exit", post(handle_pos_exit))
        // Legacy alias of /pos-exit.
        .route("/exit", post(handle_pos_exit))
        .route("/plasma-burn", post(handle_plasma_burn))
        .route("/plasma-confirm", post(handle_plasma_confirm))
        .route("/plasma-exit", post(handle_plasma_exit));

    let mut router = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_scrape))
        .nest("/v1", v1)
        .route("/v2/withdraw", post(handle_withdraw));

    if state.checkpoint_tracker.is_some() {
        router = router.route(
            "/checkpoint",
            get(handle_checkpoint_range).post(handle_checkpoint_covered),
        );
    }
    if state.state_id_tracker.is_some() {
        router = router.route("/state-id", get(handle_state_id));
    }

    // All origins allowed; the status API is public read-only data.
    router.layer(CorsLayer::permissive()).with_state(state)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn metrics_scrape(State(state): State<Arc<AppState>>) -> Response {
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&state.registry.gather()) {
        Ok(body) => body.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn reject(state: &AppState, error: PayloadError) -> Response {
    let reason = match error {
        PayloadError::Malformed => "malformed",
        PayloadError::Empty => "empty",
        PayloadError::Heavy => "heavy",
    };
    state
        .metrics
        .requests_rejected
        .with_label_values(&[reason])
        .inc();
    (StatusCode::BAD_REQUEST, Json(json!({ "msg": error.message() }))).into_response()
}

/// Shared validation for `{txHashes: [...]}` bodies: decodable, sized within
/// bounds, then deduplicated.
fn validate_bulk(
    state: &AppState,
    payload: Result<Json<BulkPayload>, JsonRejection>,
) -> Result<Vec<TxHash>, Response> {
    let Ok(Json(payload)) = payload else {
        return Err(reject(state, PayloadError::Malformed));
    };
    if let Err(e) = state.bounds.check(payload.tx_hashes.len()) {
        return Err(reject(state, e));
    }
    Ok(dedup_by_key(&payload.tx_hashes, |hash| *hash))
}

/// The bare-map endpoints (pos/plasma burn & exit) only differ in which flow
/// they fan out over.
async fn bulk_flow_response<F, Fut>(
    state: Arc<AppState>,
    endpoint: &'static str,
    payload: Result<Json<BulkPayload>, JsonRejection>,
    resolve: F,
) -> Response
where
    F: Fn(Arc<StatusResolver>, TxHash) -> Fut,
    Fut: Future<Output = TransactionState> + Send + 'static,
{
    state
        .metrics
        .requests_received
        .with_label_values(&[endpoint])
        .inc();
    let hashes = match validate_bulk(&state, payload) {
        Ok(hashes) => hashes,
        Err(response) => return response,
    };

    let resolver = state.resolver.clone();
    let statuses: HashMap<TxHash, TransactionState> = resolve_batch(hashes, |hash| {
        let fut = resolve(resolver.clone(), hash);
        async move { Some((hash, fut.await)) }
    })
    .await;

    Json(statuses).into_response()
}

async fn handle_approval(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BulkPayload>, JsonRejection>,
) -> Response {
    state
        .metrics
        .requests_received
        .with_label_values(&["approval"])
        .inc();
    let hashes = match validate_bulk(&state, payload) {
        Ok(hashes) => hashes,
        Err(response) => return response,
    };

    let resolver = state.resolver.clone();
    let statuses: HashMap<TxHash, TransactionState> = resolve_batch(hashes, |hash| {
        let resolver = resolver.clone();
        async move { Some((hash, resolver.approval_status(hash).await)) }
    })
    .await;

    let action = APPROVAL_AGGREGATION.action(statuses.values().map(|s| s.code));
    let count = APPROVAL_AGGREGATION.pending_count(statuses.values().map(|s| s.code));
    Json(ApprovalResponse {
        approval_tx_status: statuses,
        action,
        count,
    })
    .into_response()
}

async fn handle_deposit(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BulkPayload>, JsonRejection>,
) -> Response {
    state
        .metrics
        .requests_received
        .with_label_values(&["deposit"])
        .inc();
    let hashes = match validate_bulk(&state, payload) {
        Ok(hashes) => hashes,
        Err(response) => return response,
    };

    let resolver = state.resolver.clone();
    let statuses: HashMap<TxHash, TransactionState> = resolve_batch(hashes, |hash| {
        let resolver = resolver.clone();
        async move { Some((hash, resolver.deposit_status(hash).await)) }
    })
    .await;

    let action = DEPOSIT_AGGREGATION.action(statuses.values().map(|s| s.code));
    let count = DEPOSIT_AGGREGATION.pending_count(statuses.values().map(|s| s.code));
    Json(DepositResponse {
        deposit_tx_status: statuses,
        action,
        count,
    })
    .into_response()
}

async fn handle_pos_burn(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BulkPayload>, JsonRejection>,
) -> Response {
    bulk_flow_response(state, "pos-burn", payload, |resolver, hash| async move {
        resolver.pos_burn_status(hash).await
    })
    .await
}

async fn handle_pos_exit(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BulkPayload>, JsonRejection>,
) -> Response {
    bulk_flow_response(state, "pos-exit", payload, |resolver, hash| async move {
        resolver.pos_exit_status(hash).await
    })
    .await
}

async fn handle_plasma_burn(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BulkPayload>, JsonRejection>,
) -> Response {
    bulk_flow_response(state, "plasma-burn", payload, |resolver, hash| async move {
        resolver.checkpoint_status(hash).await
    })
    .await
}

async fn handle_plasma_exit(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BulkPayload>, JsonRejection>,
) -> Response {
    bulk_flow_response(state, "plasma-exit", payload, |resolver, hash| async move {
        resolver.plasma_exit_status(hash).await
    })
    .await
}

async fn handle_plasma_confirm(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PlasmaConfirmPayload>, JsonRejection>,
) -> Response {
    state
        .metrics
        .requests_received
        .with_label_values(&["plasma-confirm"])
        .inc();
    let Ok(Json(payload)) = payload else {
        return reject(&state, PayloadError::Malformed);
    };
    if let Err(e) = state.bounds.check(payload.tx_hashes.len()) {
        return reject(&state, e);
    }

    let pairs = dedup_by_key(&payload.tx_hashes, |pair| {
        (pair.burn_tx_hash, pair.confirm_tx_hash)
    });
    let resolver = state.resolver.clone();
    let statuses: HashMap<TxHash, TransactionState> = resolve_batch(pairs, |pair| {
        let resolver = resolver.clone();
        async move {
            let status = resolver
                .plasma_confirm_status(pair.burn_tx_hash, pair.confirm_tx_hash)
                .await;
            Some((pair.confirm_tx_hash, status))
        }
    })
    .await;

    Json(statuses).into_response()
}

async fn handle_withdraw(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WithdrawPayload>, JsonRejection>,
) -> Response {
    state
        .metrics
        .requests_received
        .with_label_values(&["withdraw"])
        .inc();
    let Ok(Json(payload)) = payload else {
        return reject(&state, PayloadError::Malformed);
    };
    if let Err(e) = state.bounds.check(payload.transactions.len()) {
        return reject(&state, e);
    }

    let transactions = dedup_by_key(&payload.transactions, |tx| tx.burn_tx_hash);
    let resolver = state.resolver.clone();
    let statuses = resolve_batch(transactions, |tx| {
        let resolver = resolver.clone();
        async move {
            // Items without a burn hash resolve to None and are left out of
            // the response map.
            let status = resolver.withdraw_status(&tx).await?;
            Some((tx.burn_tx_hash, status))
        }
    })
    .await;

    let action = WITHDRAW_AGGREGATION.action(statuses.values().map(|s| s.code));
    let count = WITHDRAW_AGGREGATION.pending_count(statuses.values().map(|s| s.code));
    Json(WithdrawResponse {
        withdraw_tx_status: statuses,
        action,
        count,
    })
    .into_response()
}

async fn handle_checkpoint_range(State(state): State<Arc<AppState>>) -> Response {
    let Some(tracker) = &state.checkpoint_tracker else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let range = tracker.snapshot().await;
    Json(CheckpointRangeResponse {
        start: range.start.to_string(),
        end: range.end.to_string(),
    })
    .into_response()
}

async fn handle_checkpoint_covered(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CheckpointLookupPayload>, JsonRejection>,
) -> Response {
    let Some(tracker) = &state.checkpoint_tracker else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Ok(Json(payload)) = payload else {
        return reject(&state, PayloadError::Malformed);
    };
    let Ok(block_number) = U256::from_dec_str(&payload.block_number) else {
        return reject(&state, PayloadError::Malformed);
    };

    let response = if tracker.covers(block_number).await {
        CheckpointCoveredResponse {
            code: 1,
            msg: "Check Pointed",
        }
    } else {
        CheckpointCoveredResponse {
            code: 0,
            msg: "Not Check Pointed",
        }
    };
    Json(response).into_response()
}

async fn handle_state_id(State(state): State<Arc<AppState>>) -> Response {
    let Some(tracker) = &state.state_id_tracker else {
        return StatusCode::NOT_FOUND.into_response();
    };
    // The in-process tracker's read side is infallible.
    let id = tracker.last_state_id().await.unwrap_or_default();
    Json(StateIdResponse { id: id.to_string() }).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint_tracker::CheckpointRange;
    use crate::test_utils::{
        failed_receipt, receipt_with_state_sync_log, resolver_fixture, successful_receipt,
        ResolverFixture,
    };
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state(fixture: &ResolverFixture) -> Arc<AppState> {
        Arc::new(AppState {
            resolver: fixture.resolver.clone(),
            bounds: PayloadBounds::default(),
            checkpoint_tracker: None,
            state_id_tracker: None,
            metrics: TrackerMetrics::new_for_testing(),
            registry: Registry::new(),
        })
    }

    async fn post_json(router: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap();
        (status, value)
    }

    fn hash_key(n: u64) -> String {
        format!("{:?}", TxHash::from_low_u64_be(n))
    }

    #[tokio::test]
    async fn test_empty_payload_rejected() {
        let fixture = resolver_fixture();
        let router = make_router(test_state(&fixture));
        let (status, body) =
            post_json(router, "/v1/approval", serde_json::json!({"txHashes": []})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Empty Payload");
    }

    #[tokio::test]
    async fn test_heavy_payload_rejected_before_any_resolution() {
        let fixture = resolver_fixture();
        let router = make_router(test_state(&fixture));
        let hashes: Vec<String> = (1..=11).map(hash_key).collect();
        let (status, body) =
            post_json(router, "/v1/approval", serde_json::json!({ "txHashes": hashes })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Heavy Payload");
        assert_eq!(fixture.root.call_count(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_bad_payload() {
        let fixture = resolver_fixture();
        let router = make_router(test_state(&fixture));
        let (status, body) =
            post_json(router, "/v1/deposit", serde_json::json!({"nope": true})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Bad Payload");
    }

    #[tokio::test]
    async fn test_deposit_batch_dedupes_and_aggregates() {
        let fixture = resolver_fixture();
        // H1 has no receipt (pending); H2's receipt reverted (failed).
        let h2 = TxHash::from_low_u64_be(2);
        let mut receipt = receipt_with_state_sync_log(50, 7);
        receipt.status = Some(0.into());
        fixture.root.insert(h2, receipt);

        let router = make_router(test_state(&fixture));
        let (status, body) = post_json(
            router,
            "/v1/deposit",
            serde_json::json!({ "txHashes": [hash_key(1), hash_key(1), hash_key(2)] }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let statuses = body["depositTxStatus"].as_object().unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[&hash_key(1)]["code"], 4);
        assert_eq!(statuses[&hash_key(1)]["msg"], "Pending");
        assert_eq!(statuses[&hash_key(2)]["code"], 2);
        assert_eq!(statuses[&hash_key(2)]["msg"], "Failed");
        assert_eq!(body["count"], 1);
        assert_eq!(body["action"], "Transaction In Progress");

        // The duplicate H1 was resolved once: one lookup per unique hash.
        assert_eq!(fixture.root.call_count(), 2);
    }

    #[tokio::test]
    async fn test_pos_exit_returns_bare_map() {
        let fixture = resolver_fixture();
        let h1 = TxHash::from_low_u64_be(1);
        fixture.root.insert(h1, successful_receipt(900));

        let router = make_router(test_state(&fixture));
        let (status, body) = post_json(
            router,
            "/v1/pos-exit",
            serde_json::json!({ "txHashes": [hash_key(1)] }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[&hash_key(1)]["code"], -10);
        assert_eq!(body[&hash_key(1)]["msg"], "Exited");
    }

    #[tokio::test]
    async fn test_legacy_exit_alias_matches_pos_exit() {
        let fixture = resolver_fixture();
        let h1 = TxHash::from_low_u64_be(1);
        fixture.root.insert(h1, failed_receipt());

        let router = make_router(test_state(&fixture));
        let (status, body) = post_json(
            router,
            "/v1/exit",
            serde_json::json!({ "txHashes": [hash_key(1)] }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[&hash_key(1)]["code"], -11);
    }

    #[tokio::test]
    async fn test_withdraw_skips_items_without_burn_hash() {
        let fixture = resolver_fixture();
        let burn = TxHash::from_low_u64_be(1);
        fixture.child.insert(burn, successful_receipt(500));
        fixture.checkpoints.set_checkpointed_up_to(500);

        let router = make_router(test_state(&fixture));
        let (status, body) = post_json(
            router,
            "/v2/withdraw",
            serde_json::json!({ "withdrawTxObjectArray": [
                { "txHash": hash_key(1), "isPoS": false },
                { "txHash": format!("{:?}", TxHash::zero()), "isPoS": true },
            ]}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let statuses = body["withdrawTxStatus"].as_object().unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[&hash_key(1)]["code"], -4);
        assert_eq!(statuses[&hash_key(1)]["isPoS"], false);
        // -4 asks the user to start the exit.
        assert_eq!(body["action"], "Action Required");
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_plasma_confirm_is_keyed_by_confirm_hash() {
        let fixture = resolver_fixture();
        let router = make_router(test_state(&fixture));
        // No receipts mocked: the confirm flow answers Pending.
        let (status, body) = post_json(
            router,
            "/v1/plasma-confirm",
            serde_json::json!({ "txHashes": [
                { "burnTxHash": hash_key(1), "confirmTxHash": hash_key(2) },
            ]}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[&hash_key(2)]["code"], -5);
    }

    #[tokio::test]
    async fn test_checkpoint_endpoints_served_when_tracker_is_wired() {
        let fixture = resolver_fixture();
        let tracker = Arc::new(CheckpointRangeTracker::new(TrackerMetrics::new_for_testing()));
        tracker
            .set_range(CheckpointRange {
                start: U256::from(100u64),
                end: U256::from(200u64),
            })
            .await;

        let state = Arc::new(AppState {
            resolver: fixture.resolver.clone(),
            bounds: PayloadBounds::default(),
            checkpoint_tracker: Some(tracker),
            state_id_tracker: None,
            metrics: TrackerMetrics::new_for_testing(),
            registry: Registry::new(),
        });

        let (status, body) = post_json(
            make_router(state.clone()),
            "/checkpoint",
            serde_json::json!({"blockNumber": "200"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 1);
        assert_eq!(body["msg"], "Check Pointed");

        let (status, body) = post_json(
            make_router(state.clone()),
            "/checkpoint",
            serde_json::json!({"blockNumber": "201"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 0);

        let (status, body) = post_json(
            make_router(state),
            "/checkpoint",
            serde_json::json!({"blockNumber": "not-a-number"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Bad Payload");
    }
}
