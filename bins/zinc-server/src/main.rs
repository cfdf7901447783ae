//! zinc-server: HTTP API for transparent-address Zcash wallets.
//!
//! Derives per-user keys, builds and signs transactions locally, relays them
//! through the configured providers, and tracks confirmations in RocksDB.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

mod config;
mod routes;

use config::Config;
use zinc_providers::build_sources;
use zinc_service::{ConfirmationReconciler, RocksTxStore, WalletService};

/// Shared application state passed to every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WalletService>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load zinc-server configuration")?;
    init_logging(&config.log_level, &config.log_format);

    let service_config = config.service_config();
    let db_path = service_config.db_path();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        network = %config.network,
        bind = %config.bind_addr,
        db = %db_path.display(),
        providers = config.providers.len(),
        fee_rate = config.fee_rate,
        branch_id = format_args!("{:#010x}", config.branch_id),
        "Starting zinc-server"
    );
    for spec in &config.providers {
        info!(provider = %spec, "provider configured");
    }

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
    }
    let store = Arc::new(
        RocksTxStore::open(&db_path)
            .with_context(|| format!("Failed to open transaction database at {}", db_path.display()))?,
    );

    let (utxos, chain) = build_sources(&service_config.providers, service_config.provider_timeout)
        .context("Failed to construct providers")?;

    let reconciler = ConfirmationReconciler::new(store.clone(), chain.clone(), service_config.reconcile);
    let (reconciler_handle, stop_reconciler) = reconciler.spawn();

    let service = Arc::new(WalletService::new(&service_config, utxos, chain, store.clone()));
    let app = routes::router(AppState { service });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    if stop_reconciler.send(true).is_err() {
        warn!("reconciler already stopped");
    }
    if let Err(e) = reconciler_handle.await {
        error!(error = %e, "reconciler task failed");
    }
    store.flush().context("Failed to flush transaction database")?;

    info!("zinc-server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down..."),
        Err(e) => error!(error = %e, "failed to listen for Ctrl+C"),
    }
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `RUST_LOG` overrides `level_str`. Pass `format = "json"` for structured
/// JSON output; any other value gives human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
