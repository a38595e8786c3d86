//! # Hive - task marketplace server
//!
//! ## Startup
//!
//! 1. Parse configuration from flags and `HIVE_*` environment variables
//! 2. Build the store, the marketplace and the HTTP state
//! 3. Start the assignment lease sweeper (unless leases are disabled)
//! 4. Serve until Ctrl+C, then drain requests and stop the sweeper

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hive_ledger::{LeaseSweeper, Marketplace};
use hive_store::{InMemoryKvStore, TracingKvStore};
use hive_web::AppState;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::{Cli, DEFAULT_ADMIN_KEY};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if cli.admin_key == DEFAULT_ADMIN_KEY {
        warn!("HIVE_ADMIN_KEY is not set; admin endpoints accept the default key");
    }

    let ledger_config = cli.ledger_config();
    let lease = ledger_config.assignment_lease;
    let store = Arc::new(TracingKvStore::new(InMemoryKvStore::new()));
    let marketplace = Arc::new(Marketplace::with_system_clock(store, ledger_config));
    info!(
        storage = marketplace.storage_backend(),
        starter_credits = cli.starter_credits,
        "marketplace initialized"
    );

    let sweeper = lease.map(|lease| {
        info!(lease_secs = lease.num_seconds(), "assignment leases enabled");
        LeaseSweeper::start(Arc::clone(&marketplace), cli.sweep_interval())
    });

    let state = AppState::new(Arc::clone(&marketplace), cli.admin_key.as_str());
    let served = hive_web::run_server(cli.server_config(), state, wait_for_shutdown())
        .await
        .with_context(|| format!("HTTP server on {} failed", cli.bind));

    if let Some(sweeper) = sweeper {
        sweeper.stop().await;
    }
    served?;

    info!("Hive shutdown complete");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hive_web=debug,tower_http=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for shutdown signal (Ctrl+C).
async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(err) => error!("Failed to listen for shutdown signal: {}", err),
    }
}
