//! Observability infrastructure for the sync engine
//!
//! Provides:
//! - Prometheus metrics (config fetch outcomes, background runs, interop notices, sync outcome)
//! - Structured JSON logging with tracing

use crate::telemetry::SyncOutcomeCounts;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, register_int_gauge_vec,
    Histogram, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for background run duration (in seconds)
const RUN_DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<SyncMetricsInner> = OnceLock::new();

struct SyncMetricsInner {
    config_fetches: IntCounterVec,
    config_version: IntGauge,
    background_runs: IntCounterVec,
    background_run_seconds: Histogram,
    interop_notifications: IntCounterVec,
    last_sync_outcome: IntGaugeVec,
}

impl SyncMetricsInner {
    fn new() -> Self {
        Self {
            config_fetches: register_int_counter_vec!(
                "sync_agent_config_fetches_total",
                "Config load attempts by outcome",
                &["outcome"]
            )
            .expect("Failed to register config_fetches_total"),

            config_version: register_int_gauge!(
                "sync_agent_config_version",
                "Version of the last committed remote config"
            )
            .expect("Failed to register config_version"),

            background_runs: register_int_counter_vec!(
                "sync_agent_background_runs_total",
                "Background execution windows by aggregate result",
                &["result"]
            )
            .expect("Failed to register background_runs_total"),

            background_run_seconds: register_histogram!(
                "sync_agent_background_run_seconds",
                "Time from background trigger to completion report",
                RUN_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register background_run_seconds"),

            interop_notifications: register_int_counter_vec!(
                "sync_agent_interop_notifications_total",
                "Interop local notifications posted by kind",
                &["notice"]
            )
            .expect("Failed to register interop_notifications_total"),

            last_sync_outcome: register_int_gauge_vec!(
                "sync_agent_last_sync_outcome",
                "Request counts of the last SDK sync by bucket",
                &["bucket"]
            )
            .expect("Failed to register last_sync_outcome"),
        }
    }
}

/// Handle to the process-wide sync metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct SyncMetrics {
    _private: (),
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SyncMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SyncMetricsInner {
        GLOBAL_METRICS.get_or_init(SyncMetricsInner::new)
    }

    /// Count a config load; `outcome` is `cached`, `fetched` or an error kind
    pub fn inc_config_fetch(&self, outcome: &str) {
        self.inner()
            .config_fetches
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn set_config_version(&self, version: i64) {
        self.inner().config_version.set(version);
    }

    pub fn observe_background_run(&self, succeeded: bool, duration_secs: f64) {
        let result = if succeeded { "succeeded" } else { "failed" };
        self.inner()
            .background_runs
            .with_label_values(&[result])
            .inc();
        self.inner().background_run_seconds.observe(duration_secs);
    }

    pub fn inc_interop_notification(&self, notice: &str) {
        self.inner()
            .interop_notifications
            .with_label_values(&[notice])
            .inc();
    }

    pub fn set_sync_outcome(&self, counts: &SyncOutcomeCounts) {
        let gauge = &self.inner().last_sync_outcome;
        gauge.with_label_values(&["instant"]).set(counts.instant as i64);
        gauge.with_label_values(&["delayed"]).set(counts.delayed as i64);
        gauge.with_label_values(&["success"]).set(counts.success as i64);
    }
}

/// Structured logger for sync engine events
#[derive(Clone)]
pub struct StructuredLogger {
    installation: String,
}

impl StructuredLogger {
    pub fn new(installation: impl Into<String>) -> Self {
        Self {
            installation: installation.into(),
        }
    }

    pub fn log_config_loaded(&self, mode: &str, config_version: i64, countries: usize) {
        info!(
            event = "config_loaded",
            installation = %self.installation,
            mode = %mode,
            config_version = config_version,
            countries = countries,
            "Committed verified remote config"
        );
    }

    pub fn log_config_rejected(&self, mode: &str, kind: &str, reason: &str) {
        warn!(
            event = "config_rejected",
            installation = %self.installation,
            mode = %mode,
            kind = %kind,
            reason = %reason,
            "Config refresh failed, keeping cached config"
        );
    }

    pub fn log_force_update(&self, config_version: i64) {
        warn!(
            event = "force_update_required",
            installation = %self.installation,
            config_version = config_version,
            "Server requires an app update"
        );
    }

    pub fn log_interop_reconciled(
        &self,
        config_version: i64,
        state: &str,
        notices: usize,
        pruned: usize,
    ) {
        info!(
            event = "interop_reconciled",
            installation = %self.installation,
            config_version = config_version,
            state = %state,
            notices = notices,
            pruned = pruned,
            "Interop settings reconciled with server config"
        );
    }

    pub fn log_background_run(
        &self,
        succeeded: bool,
        config_cancelled: bool,
        padding_cancelled: bool,
    ) {
        if succeeded {
            info!(
                event = "background_run_completed",
                installation = %self.installation,
                succeeded = true,
                "Background run completed"
            );
        } else {
            warn!(
                event = "background_run_completed",
                installation = %self.installation,
                succeeded = false,
                config_cancelled = config_cancelled,
                padding_cancelled = padding_cancelled,
                "Background run ran out of budget"
            );
        }
    }

    pub fn log_sync_completed(&self, code: &str, total_requests: usize, errors: usize) {
        info!(
            event = "sync_completed",
            installation = %self.installation,
            code = %code,
            total_requests = total_requests,
            errors = errors,
            "SDK sync finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_metrics_creation() {
        let metrics = SyncMetrics::new();
        metrics.inc_config_fetch("cached");
        metrics.set_config_version(4);
        metrics.observe_background_run(true, 0.2);
        metrics.inc_interop_notification("countries_changed");
        metrics.set_sync_outcome(&SyncOutcomeCounts {
            instant: 1,
            delayed: 0,
            success: 5,
        });

        // Second handle shares the registry
        SyncMetrics::new().inc_config_fetch("network");
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("install-1");
        assert_eq!(logger.installation, "install-1");
    }
}
