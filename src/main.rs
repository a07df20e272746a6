// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use bridge_tracker::config::TrackerNodeConfig;
use bridge_tracker::node::run_tracker_node;
use clap::Parser;
use prometheus::Registry;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[clap(rename_all = "kebab-case")]
#[clap(name = env!("CARGO_BIN_NAME"))]
struct Args {
    #[clap(long)]
    pub config_path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = TrackerNodeConfig::load(&args.config_path)?;

    let registry = Registry::new();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(
        "Starting bridge tracker (port {}, payload bounds {}..{})",
        config.server_listen_port, config.payload_bounds.min, config.payload_bounds.max
    );

    let handle = run_tracker_node(config, registry).await?;
    handle
        .await
        .map_err(|e| anyhow::anyhow!("Task join error: {}", e))
}
