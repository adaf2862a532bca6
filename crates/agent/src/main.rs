//! Sync Agent - signed config sync and interop consistency host
//!
//! Loads the remote config at start-up, then delivers periodic background
//! execution windows to the engine and serves the control API.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use sync_agent::{
    api,
    config::AgentConfig,
    host::{HeadlessSdk, LogNotifier, LogWarnings},
};
use sync_core::store::FileStore;
use sync_core::FetchMode;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = AGENT_VERSION, "Starting sync-agent");

    let config = AgentConfig::load()?;
    info!(
        installation = %config.installation,
        store = %config.store_path.display(),
        config_base_url = %config.config_base_url,
        "Agent configured"
    );

    let store = Arc::new(FileStore::open(&config.store_path).context("Failed to open store")?);
    let sdk = Arc::new(HeadlessSdk::default());
    let notifier = Arc::new(LogNotifier::default());
    let warnings = Arc::new(LogWarnings::default());

    let service = Arc::new(sync_agent::build_service(
        &config,
        store,
        sdk.clone(),
        notifier.clone(),
        warnings.clone(),
    )?);
    service.start();

    match service.load_config(FetchMode::Foreground).await {
        Some(remote) => info!(version = remote.config_version, "Config available"),
        None => warn!("No config available yet, continuing with defaults"),
    }

    let app_state = Arc::new(api::AppState::new(
        service.clone(),
        sdk,
        notifier,
        warnings,
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(sync_agent::run_background_windows(
        service,
        Duration::from_secs(config.background_interval_secs),
        Duration::from_secs(config.background_budget_secs),
        shutdown_rx,
    ));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        warn!(error = %e, "Background scheduler ended abnormally");
    }
    api_handle.abort();

    Ok(())
}
