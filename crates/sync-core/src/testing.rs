//! Recording collaborators shared by unit tests

use crate::background::{PaddingRequest, SyncWarningNotifier};
use crate::error::StoreError;
use crate::interop::LocalNotifier;
use crate::models::{RemoteConfig, SdkParameters, SharingCountry};
use crate::sdk::{ExposureSdk, SdkInteropMode, SyncReport};
use crate::store::{KeyValueStore, MemoryStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum SdkCall {
    State(SdkInteropMode),
    Possible(bool),
    Countries(Vec<String>),
    Selected(Vec<String>),
    Parameters(SdkParameters),
}

#[derive(Default)]
pub struct RecordingSdk {
    calls: Mutex<Vec<SdkCall>>,
    report: Mutex<SyncReport>,
    sync_delay: Mutex<Option<Duration>>,
}

impl RecordingSdk {
    pub fn with_report(report: SyncReport) -> Self {
        let sdk = Self::default();
        *sdk.report.lock().unwrap() = report;
        sdk
    }

    pub fn with_sync_delay(self, delay: Duration) -> Self {
        *self.sync_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<SdkCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: SdkCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ExposureSdk for RecordingSdk {
    fn set_interop_state(&self, mode: SdkInteropMode) {
        self.record(SdkCall::State(mode));
    }

    fn set_interop_possible(&self, possible: bool) {
        self.record(SdkCall::Possible(possible));
    }

    fn set_interop_countries(&self, countries: &[String]) {
        self.record(SdkCall::Countries(countries.to_vec()));
    }

    fn set_interop_selected_countries(&self, countries: &[String]) {
        self.record(SdkCall::Selected(countries.to_vec()));
    }

    fn update_parameters(&self, parameters: &SdkParameters) {
        self.record(SdkCall::Parameters(parameters.clone()));
    }

    async fn sync(&self) -> SyncReport {
        let delay = *self.sync_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.report.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    posted: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn posted(&self) -> Vec<(String, String)> {
        self.posted.lock().unwrap().clone()
    }
}

impl LocalNotifier for RecordingNotifier {
    fn post_local_notification(&self, title: &str, body: &str) {
        self.posted
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

/// Padding request that answers after an optional delay
pub struct StubPadding {
    pub delay: Option<Duration>,
    pub result: Result<u16, String>,
    pub sent: AtomicUsize,
}

impl StubPadding {
    pub fn ok() -> Self {
        Self {
            delay: None,
            result: Ok(200),
            sent: AtomicUsize::new(0),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::ok()
        }
    }
}

#[async_trait]
impl PaddingRequest for StubPadding {
    async fn send(&self) -> Result<u16, String> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

#[derive(Default)]
pub struct CountingWarnings {
    pub resets: AtomicUsize,
}

impl SyncWarningNotifier for CountingWarnings {
    fn reset_warnings(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Config with the given version, availability and country codes
pub fn config_with(version: i64, possible: bool, codes: &[&str]) -> RemoteConfig {
    RemoteConfig {
        config_version: version,
        force_update: false,
        eu_sharing_enabled: possible,
        eu_sharing_countries: codes
            .iter()
            .map(|code| SharingCountry {
                country_code: code.to_string(),
                name_en: format!("Country {}", code),
                name_local: String::new(),
            })
            .collect(),
        sdk_config: None,
    }
}

/// Memory store that refuses writes to one key
pub struct RejectingStore {
    pub inner: MemoryStore,
    pub rejected_key: &'static str,
}

impl RejectingStore {
    pub fn new(rejected_key: &'static str) -> Self {
        Self {
            inner: MemoryStore::new(),
            rejected_key,
        }
    }
}

impl KeyValueStore for RejectingStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        if key == self.rejected_key {
            return Err(StoreError::Persist(anyhow::anyhow!("disk full")));
        }
        self.inner.set(key, value)
    }
}
