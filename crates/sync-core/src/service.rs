//! Owner of the engine's shared state
//!
//! `SyncService` holds the store, the config cache, the interop state
//! machine, the fetcher, the telemetry log and the background orchestrator.
//! Hosts build one through `SyncServiceBuilder` and pass it around instead of
//! reaching for globals.

use crate::background::{
    BackgroundOrchestrator, BackgroundRun, CompletionHandle, PaddingRequest, SyncWarningNotifier,
};
use crate::clock::{Clock, SystemClock};
use crate::config_sync::{
    ConfigCache, ConfigEndpoint, ConfigFetcher, ConfigLoad, FetchMode, SignatureVerifier,
};
use crate::error::FetchError;
use crate::interop::{InteropStateMachine, LocalNotifier};
use crate::models::RemoteConfig;
use crate::observability::StructuredLogger;
use crate::sdk::ExposureSdk;
use crate::store::KeyValueStore;
use crate::telemetry::TelemetryLog;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct SyncService {
    store: Arc<dyn KeyValueStore>,
    cache: ConfigCache,
    interop: Arc<InteropStateMachine>,
    fetcher: Arc<ConfigFetcher>,
    telemetry: TelemetryLog,
    orchestrator: BackgroundOrchestrator,
}

impl SyncService {
    pub fn builder() -> SyncServiceBuilder {
        SyncServiceBuilder::new()
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }

    pub fn interop(&self) -> &Arc<InteropStateMachine> {
        &self.interop
    }

    pub fn fetcher(&self) -> &Arc<ConfigFetcher> {
        &self.fetcher
    }

    pub fn telemetry(&self) -> &TelemetryLog {
        &self.telemetry
    }

    /// Replay persisted interop settings into the SDK
    pub fn start(&self) {
        self.interop.push_to_sdk();
        info!(
            state = %self.interop.state(),
            cached_version = ?self.cache.current().map(|c| c.config_version),
            "Sync service started"
        );
    }

    pub async fn load_config(&self, mode: FetchMode) -> Option<RemoteConfig> {
        self.fetcher.load_config(mode).await
    }

    pub async fn try_load_config(&self, mode: FetchMode) -> Result<ConfigLoad, FetchError> {
        self.fetcher
            .try_load_config(mode, &CancellationToken::new())
            .await
    }

    pub async fn run_background(
        &self,
        budget: Duration,
        completion: CompletionHandle,
    ) -> BackgroundRun {
        self.orchestrator.run(budget, completion).await
    }
}

/// Builder for `SyncService`
pub struct SyncServiceBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    sdk: Option<Arc<dyn ExposureSdk>>,
    notifier: Option<Arc<dyn LocalNotifier>>,
    warnings: Option<Arc<dyn SyncWarningNotifier>>,
    padding: Option<Arc<dyn PaddingRequest>>,
    endpoint: Option<ConfigEndpoint>,
    verifier: Option<SignatureVerifier>,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
    installation: String,
}

impl Default for SyncServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            sdk: None,
            notifier: None,
            warnings: None,
            padding: None,
            endpoint: None,
            verifier: None,
            clock: Arc::new(SystemClock),
            request_timeout: Duration::from_secs(30),
            installation: "default".to_string(),
        }
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn sdk(mut self, sdk: Arc<dyn ExposureSdk>) -> Self {
        self.sdk = Some(sdk);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn LocalNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn warnings(mut self, warnings: Arc<dyn SyncWarningNotifier>) -> Self {
        self.warnings = Some(warnings);
        self
    }

    pub fn padding(mut self, padding: Arc<dyn PaddingRequest>) -> Self {
        self.padding = Some(padding);
        self
    }

    pub fn endpoint(mut self, endpoint: ConfigEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn installation(mut self, installation: impl Into<String>) -> Self {
        self.installation = installation.into();
        self
    }

    pub fn build(self) -> Result<SyncService> {
        let store = self.store.context("store is required")?;
        let sdk = self.sdk.context("sdk is required")?;
        let notifier = self.notifier.context("notifier is required")?;
        let warnings = self.warnings.context("warning notifier is required")?;
        let padding = self.padding.context("padding request is required")?;
        let endpoint = self.endpoint.context("config endpoint is required")?;
        let verifier = self.verifier.context("signature verifier is required")?;

        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .context("Failed to build config HTTP client")?;

        let logger = StructuredLogger::new(self.installation);
        let cache = ConfigCache::new(store.clone());
        let telemetry = TelemetryLog::new(store.clone(), self.clock.clone());
        let interop = Arc::new(InteropStateMachine::new(
            store.clone(),
            sdk.clone(),
            notifier,
            logger.clone(),
        ));
        let fetcher = Arc::new(ConfigFetcher::new(
            http,
            endpoint,
            verifier,
            cache.clone(),
            interop.clone(),
            sdk.clone(),
            telemetry.clone(),
            self.clock,
            logger.clone(),
        ));
        let orchestrator = BackgroundOrchestrator::new(
            fetcher.clone(),
            padding,
            sdk,
            warnings,
            telemetry.clone(),
            logger,
        );

        Ok(SyncService {
            store,
            cache,
            interop,
            fetcher,
            telemetry,
            orchestrator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_sync::ConfigSigner;
    use crate::interop::InteropChoice;
    use crate::sdk::SdkInteropMode;
    use crate::store::MemoryStore;
    use crate::testing::{CountingWarnings, RecordingNotifier, RecordingSdk, SdkCall, StubPadding};

    fn builder(sdk: Arc<RecordingSdk>) -> SyncServiceBuilder {
        let signer = ConfigSigner::new([7u8; 32], "config-service");
        SyncService::builder()
            .store(Arc::new(MemoryStore::new()))
            .sdk(sdk)
            .notifier(Arc::new(RecordingNotifier::default()))
            .warnings(Arc::new(CountingWarnings::default()))
            .padding(Arc::new(StubPadding::ok()))
            .endpoint(ConfigEndpoint::new("http://127.0.0.1:9", "1.0.0", "14.2", "42").unwrap())
            .verifier(SignatureVerifier::new(signer.verifying_key(), "config-service"))
            .installation("test")
    }

    #[test]
    fn test_build_requires_collaborators() {
        let err = SyncService::builder().build().err().unwrap();
        assert!(err.to_string().contains("store is required"));
    }

    #[test]
    fn test_start_replays_interop_settings() {
        let sdk = Arc::new(RecordingSdk::default());
        let service = builder(sdk.clone()).build().unwrap();

        service.interop().apply_choice(InteropChoice::Eu);
        service.start();

        assert_eq!(
            sdk.calls().last(),
            Some(&SdkCall::State(SdkInteropMode::Eu))
        );
        assert!(service.cache().current().is_none());
    }
}
