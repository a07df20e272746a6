// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wires the configured collaborators into a running tracker node: chain
//! clients, the status cache, the background trackers (or their HTTP
//! stand-ins) and the REST server.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use ethers::types::Address;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::chain_client::{ChainClient, ExitNftClient};
use crate::checkpoint_tracker::{
    CheckpointOracle, CheckpointRangeTracker, EthCheckpointSource,
};
use crate::config::TrackerNodeConfig;
use crate::metrics::TrackerMetrics;
use crate::peer_client::{CheckpointServiceClient, ExitCheckerClient, StateIdServiceClient};
use crate::server::{run_server, AppState};
use crate::state_id::{EthStateIdSource, StateIdOracle, StateIdTracker};
use crate::status::StatusResolver;
use crate::store::PgStatusStore;

const DB_POOL_SIZE: u32 = 16;

fn parse_address(value: &str, what: &str) -> anyhow::Result<Address> {
    value
        .parse::<Address>()
        .map_err(|e| anyhow!("invalid {what} address {value:?}: {e}"))
}

/// Starts every component and returns the server task handle. Startup
/// failures (chain RPC, database, migrations) abort here; a checkpoint
/// subscription that cannot be recovered later terminates the process so the
/// supervisor can restart it with a fresh subscription.
pub async fn run_tracker_node(
    config: TrackerNodeConfig,
    registry: Registry,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let metrics = TrackerMetrics::new(&registry);

    let root_client = Arc::new(
        ChainClient::new(&config.root.rpc_url, "root")
            .await
            .context("connecting to root chain rpc")?,
    );
    let child_client = Arc::new(
        ChainClient::new(&config.child.rpc_url, "child")
            .await
            .context("connecting to child chain rpc")?,
    );

    PgStatusStore::run_migrations(&config.database_url)
        .await
        .context("running status cache migrations")?;
    let store = Arc::new(
        PgStatusStore::connect(&config.database_url, DB_POOL_SIZE)
            .await
            .context("connecting to status cache database")?,
    );

    let cancel = CancellationToken::new();

    let (checkpoint_oracle, checkpoint_tracker): (
        Arc<dyn CheckpointOracle>,
        Option<Arc<CheckpointRangeTracker>>,
    ) = match &config.peers.checkpoint_url {
        Some(url) => {
            info!("Using checkpoint tracker sibling at {}", url);
            (Arc::new(CheckpointServiceClient::new(url)), None)
        }
        None => {
            let contract = parse_address(
                &config.root.checkpoint_manager_address,
                "checkpoint manager",
            )?;
            let source = Arc::new(
                EthCheckpointSource::connect(&config.root.ws_rpc_url, contract)
                    .await
                    .context("connecting checkpoint event subscription")?,
            );
            let tracker = Arc::new(CheckpointRangeTracker::new(metrics.clone()));
            let run_tracker = tracker.clone();
            let run_cancel = cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = run_tracker.run(source, run_cancel).await {
                    error!(
                        "Checkpoint subscription could not be recovered: {:?}; exiting",
                        e
                    );
                    // The process supervisor restarts us with a fresh
                    // subscription.
                    std::process::exit(1);
                }
            });
            (tracker.clone(), Some(tracker))
        }
    };

    let (state_id_oracle, state_id_tracker): (
        Arc<dyn StateIdOracle>,
        Option<Arc<StateIdTracker>>,
    ) = match &config.peers.state_id_url {
        Some(url) => {
            info!("Using state-id manager sibling at {}", url);
            (Arc::new(StateIdServiceClient::new(url)), None)
        }
        None => {
            let contract = parse_address(&config.child.state_receiver_address, "state receiver")?;
            let source = Arc::new(EthStateIdSource::new(contract, child_client.provider()));
            let tracker = Arc::new(StateIdTracker::new(metrics.clone()));
            tokio::spawn(tracker.clone().run(source, cancel.clone()));
            (tracker.clone(), Some(tracker))
        }
    };

    let exit_oracle = Arc::new(ExitCheckerClient::new(&config.peers.exit_checker_url));
    let exit_nft = Arc::new(ExitNftClient::new(
        parse_address(&config.root.exit_nft_address, "exit NFT")?,
        root_client.provider(),
    ));

    let resolver = Arc::new(StatusResolver::new(
        root_client,
        child_client,
        store,
        checkpoint_oracle,
        state_id_oracle,
        exit_oracle,
        exit_nft,
        metrics.clone(),
    ));

    let state = Arc::new(AppState {
        resolver,
        bounds: config.payload_bounds,
        checkpoint_tracker,
        state_id_tracker,
        metrics,
        registry,
    });

    let socket_address = SocketAddr::new(
        IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        config.server_listen_port,
    );
    Ok(run_server(socket_address, state))
}
