use super::completion::CompletionHandle;
use super::padding::PaddingRequest;
use super::SyncWarningNotifier;
use crate::config_sync::{ConfigFetcher, FetchMode};
use crate::error::FetchError;
use crate::observability::{StructuredLogger, SyncMetrics};
use crate::sdk::{ExposureSdk, SyncReport};
use crate::telemetry::{
    SyncOutcomeCounts, TelemetryEventType, TelemetryKind, TelemetryLog, TELEMETRY_RETENTION_DAYS,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How a budgeted subtask ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtaskOutcome {
    /// Finished within budget; `true` when it also succeeded
    Completed(bool),
    /// Budget expired first; its future was dropped
    Cancelled,
}

impl SubtaskOutcome {
    pub fn is_cancelled(self) -> bool {
        matches!(self, SubtaskOutcome::Cancelled)
    }
}

/// Result of one background execution window
#[derive(Debug)]
pub struct BackgroundRun {
    /// Value reported through the completion handle
    pub succeeded: bool,
    pub config: SubtaskOutcome,
    pub padding: SubtaskOutcome,
    /// SDK sync; not part of the join, resolves to its telemetry code
    pub sdk_sync: JoinHandle<String>,
}

pub struct BackgroundOrchestrator {
    fetcher: Arc<ConfigFetcher>,
    padding: Arc<dyn PaddingRequest>,
    sdk: Arc<dyn ExposureSdk>,
    warnings: Arc<dyn SyncWarningNotifier>,
    telemetry: TelemetryLog,
    metrics: SyncMetrics,
    logger: StructuredLogger,
}

impl BackgroundOrchestrator {
    pub fn new(
        fetcher: Arc<ConfigFetcher>,
        padding: Arc<dyn PaddingRequest>,
        sdk: Arc<dyn ExposureSdk>,
        warnings: Arc<dyn SyncWarningNotifier>,
        telemetry: TelemetryLog,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            fetcher,
            padding,
            sdk,
            warnings,
            telemetry,
            metrics: SyncMetrics::new(),
            logger,
        }
    }

    /// Run one background window and report through `completion` exactly once.
    ///
    /// The result is `false` only when the budget ran out before the config
    /// fetch or the padding request finished; their own failures do not count.
    pub async fn run(&self, budget: Duration, completion: CompletionHandle) -> BackgroundRun {
        let started = Instant::now();

        self.warnings.reset_warnings();
        self.telemetry
            .prune_older_than(chrono::Duration::days(TELEMETRY_RETENTION_DAYS));

        let cancel = CancellationToken::new();
        let deadline = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                cancel.cancel();
            })
        };

        let sdk_sync = tokio::spawn(run_sdk_sync(
            self.sdk.clone(),
            self.telemetry.clone(),
            self.metrics.clone(),
            self.logger.clone(),
        ));

        let config_task = budgeted(&cancel, async {
            match self
                .fetcher
                .try_load_config(FetchMode::Background, &cancel)
                .await
            {
                Ok(_) => Some(true),
                Err(FetchError::Cancelled) => None,
                Err(_) => Some(false),
            }
        });

        let padding_task = budgeted(&cancel, async {
            let result = self.padding.send().await;
            let payload = match &result {
                Ok(status) => status.to_string(),
                Err(e) => e.clone(),
            };
            self.telemetry.append(
                TelemetryEventType::FakeRequest,
                Some(payload),
                TelemetryKind::Background,
            );
            Some(result.is_ok())
        });

        let (config, padding) = tokio::join!(config_task, padding_task);
        deadline.abort();

        let succeeded = !(config.is_cancelled() || padding.is_cancelled());
        completion.complete(succeeded);

        self.metrics
            .observe_background_run(succeeded, started.elapsed().as_secs_f64());
        self.logger
            .log_background_run(succeeded, config.is_cancelled(), padding.is_cancelled());

        BackgroundRun {
            succeeded,
            config,
            padding,
            sdk_sync,
        }
    }
}

/// Race `task` against the budget; `None` from the task also counts as cancelled
async fn budgeted<F>(cancel: &CancellationToken, task: F) -> SubtaskOutcome
where
    F: Future<Output = Option<bool>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => SubtaskOutcome::Cancelled,
        outcome = task => match outcome {
            Some(ok) => SubtaskOutcome::Completed(ok),
            None => SubtaskOutcome::Cancelled,
        },
    }
}

async fn run_sdk_sync(
    sdk: Arc<dyn ExposureSdk>,
    telemetry: TelemetryLog,
    metrics: SyncMetrics,
    logger: StructuredLogger,
) -> String {
    let report: SyncReport = sdk.sync().await;
    let counts = SyncOutcomeCounts::from_report(&report);
    let code = counts.code();

    telemetry.append(
        TelemetryEventType::Sync,
        Some(code.clone()),
        TelemetryKind::Background,
    );
    metrics.set_sync_outcome(&counts);
    logger.log_sync_completed(&code, report.total_requests, report.errors.len());

    if let Some(upload) = &report.key_upload {
        let payload = match upload {
            Ok(status) => status.to_string(),
            Err(e) => e.clone(),
        };
        debug!(payload = %payload, "Outstanding key upload finished");
        telemetry.append(
            TelemetryEventType::NextDayKeyUpload,
            Some(payload),
            TelemetryKind::Background,
        );
    }

    info!(code = %code, "SDK sync classified");
    code
}
