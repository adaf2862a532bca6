//! Headless host for the config sync engine
//!
//! Owns the persistent store, delivers periodic background execution windows
//! and serves the control API.

pub mod api;
pub mod config;
pub mod host;

use anyhow::{Context, Result};
use crate::config::AgentConfig;
use crate::host::{HeadlessSdk, LogNotifier, LogWarnings};
use std::sync::Arc;
use std::time::Duration;
use sync_core::background::HttpPaddingRequest;
use sync_core::config_sync::{ConfigEndpoint, SignatureVerifier};
use sync_core::store::KeyValueStore;
use sync_core::{CompletionHandle, SyncService};
use tokio::sync::watch;
use tracing::{info, warn};

/// Wire a `SyncService` from agent configuration
pub fn build_service(
    config: &AgentConfig,
    store: Arc<dyn KeyValueStore>,
    sdk: Arc<HeadlessSdk>,
    notifier: Arc<LogNotifier>,
    warnings: Arc<LogWarnings>,
) -> Result<SyncService> {
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let endpoint = ConfigEndpoint::new(
        &config.config_base_url,
        config.app_version.clone(),
        config.os_version.clone(),
        config.build_number.clone(),
    )?;
    let verifier = SignatureVerifier::from_hex(&config.public_key_hex, config.issuer.clone())
        .context("Invalid config signing key")?;
    let padding = HttpPaddingRequest::new(&config.padding_url, timeout)?;

    SyncService::builder()
        .store(store)
        .sdk(sdk)
        .notifier(notifier)
        .warnings(warnings)
        .padding(Arc::new(padding))
        .endpoint(endpoint)
        .verifier(verifier)
        .request_timeout(timeout)
        .installation(config.installation.clone())
        .build()
}

/// Deliver a background window every `interval` until `shutdown` flips
pub async fn run_background_windows(
    service: Arc<SyncService>,
    interval: Duration,
    budget: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; the start-up load already ran
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                info!("Background scheduler stopping");
                return;
            }
        }

        let (completion, result) = CompletionHandle::channel();
        let run = service.run_background(budget, completion).await;

        match result.await {
            Ok(true) => info!("Background window completed"),
            Ok(false) => warn!(
                config = ?run.config,
                padding = ?run.padding,
                "Background window ran out of budget, retrying next window"
            ),
            Err(_) => warn!("Background window dropped its completion handle"),
        }
    }
}
