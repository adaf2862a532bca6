//! Config fetcher
//!
//! One refresh is: staleness check, GET, signature check, parse, then commit.
//! Nothing is written unless every step succeeds and the caller's cancellation
//! token is still live. The commit itself has no suspension points, so a
//! dropped or cancelled future never leaves a partial write behind.

use super::cache::ConfigCache;
use super::endpoint::ConfigEndpoint;
use super::signature::SignatureVerifier;
use super::staleness::{should_refresh, FetchMode};
use crate::clock::Clock;
use crate::error::FetchError;
use crate::interop::InteropStateMachine;
use crate::models::RemoteConfig;
use crate::observability::{StructuredLogger, SyncMetrics};
use crate::sdk::ExposureSdk;
use crate::telemetry::{TelemetryEventType, TelemetryLog};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a config load that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigLoad {
    /// Refresh not due; the cached config, if any
    Cached(Option<RemoteConfig>),
    /// Freshly verified and committed
    Fetched(RemoteConfig),
}

impl ConfigLoad {
    pub fn config(&self) -> Option<&RemoteConfig> {
        match self {
            ConfigLoad::Cached(config) => config.as_ref(),
            ConfigLoad::Fetched(config) => Some(config),
        }
    }

    pub fn into_config(self) -> Option<RemoteConfig> {
        match self {
            ConfigLoad::Cached(config) => config,
            ConfigLoad::Fetched(config) => Some(config),
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, ConfigLoad::Fetched(_))
    }
}

pub struct ConfigFetcher {
    http: reqwest::Client,
    endpoint: ConfigEndpoint,
    verifier: SignatureVerifier,
    cache: ConfigCache,
    interop: Arc<InteropStateMachine>,
    sdk: Arc<dyn ExposureSdk>,
    telemetry: TelemetryLog,
    clock: Arc<dyn Clock>,
    metrics: SyncMetrics,
    logger: StructuredLogger,
    /// Serializes loads so each commit sees the previous one
    in_flight: Mutex<()>,
}

impl ConfigFetcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: reqwest::Client,
        endpoint: ConfigEndpoint,
        verifier: SignatureVerifier,
        cache: ConfigCache,
        interop: Arc<InteropStateMachine>,
        sdk: Arc<dyn ExposureSdk>,
        telemetry: TelemetryLog,
        clock: Arc<dyn Clock>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            http,
            endpoint,
            verifier,
            cache,
            interop,
            sdk,
            telemetry,
            clock,
            metrics: SyncMetrics::new(),
            logger,
            in_flight: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }

    pub fn endpoint(&self) -> &ConfigEndpoint {
        &self.endpoint
    }

    /// Load the config, degrading every failure to `None`
    pub async fn load_config(&self, mode: FetchMode) -> Option<RemoteConfig> {
        match self.try_load_config(mode, &CancellationToken::new()).await {
            Ok(load) => load.into_config(),
            Err(_) => None,
        }
    }

    /// Load the config, reporting why a refresh failed
    pub async fn try_load_config(
        &self,
        mode: FetchMode,
        cancel: &CancellationToken,
    ) -> Result<ConfigLoad, FetchError> {
        let _serial = self.in_flight.lock().await;

        let result = self.load_serialized(mode, cancel).await;
        match &result {
            Ok(ConfigLoad::Cached(_)) => self.metrics.inc_config_fetch("cached"),
            Ok(ConfigLoad::Fetched(_)) => self.metrics.inc_config_fetch("fetched"),
            Err(e) => {
                self.metrics.inc_config_fetch(e.kind());
                self.logger
                    .log_config_rejected(mode.as_str(), e.kind(), &e.to_string());
            }
        }
        result
    }

    async fn load_serialized(
        &self,
        mode: FetchMode,
        cancel: &CancellationToken,
    ) -> Result<ConfigLoad, FetchError> {
        let request_url = self
            .endpoint
            .request_url()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let entry = self.cache.entry();
        if !should_refresh(
            mode,
            request_url.as_str(),
            entry.last_request_url.as_deref(),
            entry.last_fetched_at,
            self.clock.now(),
        ) {
            debug!(mode = mode.as_str(), "Cached config still fresh");
            return Ok(ConfigLoad::Cached(entry.config));
        }

        self.telemetry
            .append(TelemetryEventType::Config, None, mode.into());

        debug!(url = %request_url, mode = mode.as_str(), "Requesting remote config");
        let (headers, body) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            response = self.fetch(request_url.clone()) => response?,
        };

        self.verifier.verify(&headers, &body, self.clock.now())?;
        let config = RemoteConfig::from_slice(&body)?;

        if cancel.is_cancelled() {
            debug!(version = config.config_version, "Discarding config fetched after cancellation");
            return Err(FetchError::Cancelled);
        }

        self.commit(mode, &config, request_url.as_str())?;
        Ok(ConfigLoad::Fetched(config))
    }

    async fn fetch(
        &self,
        url: url::Url,
    ) -> Result<(reqwest::header::HeaderMap, Vec<u8>), FetchError> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network(format!("unexpected status {}", status)));
        }

        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok((headers, body.to_vec()))
    }

    /// Cache write, SDK parameters, then interop reconciliation
    ///
    /// A failed cache write stops here, so the SDK and interop settings stay
    /// on the last config that was actually stored.
    fn commit(
        &self,
        mode: FetchMode,
        config: &RemoteConfig,
        request_url: &str,
    ) -> Result<(), FetchError> {
        let fetched_at = self.clock.now();
        if let Err(e) = self.cache.commit(config, fetched_at, request_url) {
            warn!(error = %e, version = config.config_version, "Failed to persist config cache");
            return Err(FetchError::Persist(e));
        }

        if let Some(parameters) = &config.sdk_config {
            self.sdk.update_parameters(parameters);
        }

        let report = self.interop.reconcile(config);

        self.metrics.set_config_version(config.config_version);
        self.logger.log_config_loaded(
            mode.as_str(),
            config.config_version,
            config.eu_sharing_countries.len(),
        );
        if config.force_update {
            self.logger.log_force_update(config.config_version);
        }

        info!(
            version = config.config_version,
            reconciled = report.applied,
            state = %report.state,
            "Remote config refreshed"
        );
        Ok(())
    }
}
