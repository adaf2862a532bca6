//! Headless implementations of the device-side collaborators
//!
//! The agent has no notification center and no matching SDK of its own. These
//! collaborators record what the engine pushes so it can be inspected through
//! the API and the logs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use sync_core::background::SyncWarningNotifier;
use sync_core::interop::LocalNotifier;
use sync_core::sdk::{ExposureSdk, SdkInteropMode, SyncReport};
use sync_core::SdkParameters;
use tracing::info;

/// Last values pushed into the SDK
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkSnapshot {
    pub mode: Option<SdkInteropMode>,
    pub possible: bool,
    pub countries: Vec<String>,
    pub selected_countries: Vec<String>,
    pub parameters: Option<serde_json::Value>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// SDK stand-in that keeps the pushed settings and syncs nothing
#[derive(Default)]
pub struct HeadlessSdk {
    snapshot: Mutex<SdkSnapshot>,
}

impl HeadlessSdk {
    pub fn snapshot(&self) -> SdkSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SdkSnapshot> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ExposureSdk for HeadlessSdk {
    fn set_interop_state(&self, mode: SdkInteropMode) {
        info!(mode = ?mode, "SDK interop mode set");
        self.lock().mode = Some(mode);
    }

    fn set_interop_possible(&self, possible: bool) {
        self.lock().possible = possible;
    }

    fn set_interop_countries(&self, countries: &[String]) {
        self.lock().countries = countries.to_vec();
    }

    fn set_interop_selected_countries(&self, countries: &[String]) {
        self.lock().selected_countries = countries.to_vec();
    }

    fn update_parameters(&self, parameters: &SdkParameters) {
        self.lock().parameters = Some(parameters.0.clone());
    }

    async fn sync(&self) -> SyncReport {
        self.lock().last_sync_at = Some(Utc::now());
        SyncReport::default()
    }
}

/// A posted local notification
#[derive(Debug, Clone, Serialize)]
pub struct PostedNotification {
    pub title: String,
    pub body: String,
    pub posted_at: DateTime<Utc>,
}

/// Notifier that logs and keeps posted notifications
#[derive(Default)]
pub struct LogNotifier {
    posted: Mutex<Vec<PostedNotification>>,
}

impl LogNotifier {
    pub fn posted(&self) -> Vec<PostedNotification> {
        self.posted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl LocalNotifier for LogNotifier {
    fn post_local_notification(&self, title: &str, body: &str) {
        info!(title = %title, body = %body, "Local notification posted");
        self.posted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PostedNotification {
                title: title.to_string(),
                body: body.to_string(),
                posted_at: Utc::now(),
            });
    }
}

/// Tracks when sync reminders were last reset
#[derive(Default)]
pub struct LogWarnings {
    last_reset: Mutex<Option<DateTime<Utc>>>,
}

impl LogWarnings {
    pub fn last_reset(&self) -> Option<DateTime<Utc>> {
        *self.last_reset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SyncWarningNotifier for LogWarnings {
    fn reset_warnings(&self) {
        *self.last_reset.lock().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
    }
}
