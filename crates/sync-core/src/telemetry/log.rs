//! Append-only telemetry log persisted in the key-value store

use crate::clock::Clock;
use crate::config_sync::FetchMode;
use crate::store::{KeyValueStore, KeyValueStoreExt};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub const TELEMETRY_LOG_KEY: &str = "telemetry.log";

/// Entries older than this are dropped at the start of each background run
pub const TELEMETRY_RETENTION_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TelemetryEventType {
    Config,
    Sync,
    FakeRequest,
    NextDayKeyUpload,
}

impl TelemetryEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            TelemetryEventType::Config => "config",
            TelemetryEventType::Sync => "sync",
            TelemetryEventType::FakeRequest => "fakeRequest",
            TelemetryEventType::NextDayKeyUpload => "nextDayKeyUpload",
        }
    }
}

impl fmt::Display for TelemetryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TelemetryEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" => Ok(TelemetryEventType::Config),
            "sync" => Ok(TelemetryEventType::Sync),
            "fakeRequest" | "fake-request" => Ok(TelemetryEventType::FakeRequest),
            "nextDayKeyUpload" | "next-day-key-upload" => Ok(TelemetryEventType::NextDayKeyUpload),
            other => Err(format!("unknown telemetry event type: {}", other)),
        }
    }
}

/// Run kind the entry was produced in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryKind {
    Foreground,
    Background,
}

impl From<FetchMode> for TelemetryKind {
    fn from(mode: FetchMode) -> Self {
        match mode {
            FetchMode::Foreground => TelemetryKind::Foreground,
            FetchMode::Background => TelemetryKind::Background,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEntry {
    pub event_type: TelemetryEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub kind: TelemetryKind,
}

/// Telemetry sink shared by the fetcher and the background orchestrator
#[derive(Clone)]
pub struct TelemetryLog {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    write_lock: Arc<Mutex<()>>,
}

impl TelemetryLog {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append an entry stamped with the current time.
    ///
    /// Persistence failures are logged; telemetry never fails the caller.
    pub fn append(
        &self,
        event_type: TelemetryEventType,
        payload: Option<String>,
        kind: TelemetryKind,
    ) -> TelemetryEntry {
        let entry = TelemetryEntry {
            event_type,
            payload,
            recorded_at: self.clock.now(),
            kind,
        };

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load();
        entries.push(entry.clone());
        if let Err(e) = self.store.set_as(TELEMETRY_LOG_KEY, &entries) {
            warn!(event_type = %event_type, error = %e, "Failed to persist telemetry entry");
        } else {
            debug!(event_type = %event_type, payload = ?entry.payload, "Telemetry recorded");
        }

        entry
    }

    /// Entries in insertion order, optionally restricted to one event type
    pub fn entries(&self, filter: Option<TelemetryEventType>) -> Vec<TelemetryEntry> {
        self.load()
            .into_iter()
            .filter(|e| filter.map_or(true, |t| e.event_type == t))
            .collect()
    }

    /// Drop entries older than `max_age`, returning how many were removed
    pub fn prune_older_than(&self, max_age: Duration) -> usize {
        let cutoff = self.clock.now() - max_age;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|e| e.recorded_at >= cutoff);
        let removed = before - entries.len();

        if removed > 0 {
            if let Err(e) = self.store.set_as(TELEMETRY_LOG_KEY, &entries) {
                warn!(error = %e, "Failed to persist pruned telemetry log");
                return 0;
            }
            debug!(removed, remaining = entries.len(), "Pruned telemetry log");
        }

        removed
    }

    fn load(&self) -> Vec<TelemetryEntry> {
        self.store
            .get_as::<Vec<TelemetryEntry>>(TELEMETRY_LOG_KEY)
            .unwrap_or_default()
    }
}
