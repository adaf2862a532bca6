//! Integration tests for the background orchestrator
//!
//! These tests verify:
//! - The completion handle fires exactly once with the aggregate result
//! - Budget expiry cancels pending subtasks without late writes
//! - SDK sync outcomes reach telemetry

use super::*;
use crate::clock::{Clock, FixedClock};
use crate::config_sync::{
    ConfigCache, ConfigEndpoint, ConfigFetcher, ConfigSigner, SignatureVerifier, CONFIG_CACHE_KEY,
};
use crate::interop::InteropStateMachine;
use crate::observability::StructuredLogger;
use crate::sdk::{SyncError, SyncReport};
use crate::store::{KeyValueStore, MemoryStore};
use crate::telemetry::{TelemetryEventType, TelemetryKind, TelemetryLog};
use crate::testing::{CountingWarnings, RecordingNotifier, RecordingSdk, StubPadding};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ISSUER: &str = "config-service";
const BODY: &str = r#"{"configVersion": 3, "euSharingEnabled": true, "euSharingCountries": []}"#;

struct Fixture {
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    telemetry: TelemetryLog,
    warnings: Arc<CountingWarnings>,
    orchestrator: BackgroundOrchestrator,
}

fn fixture(base_url: &str, padding: StubPadding, sdk: RecordingSdk) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 22, 0, 0).unwrap(),
    ));
    let sdk = Arc::new(sdk);
    let interop = Arc::new(InteropStateMachine::new(
        store.clone(),
        sdk.clone(),
        Arc::new(RecordingNotifier::default()),
        StructuredLogger::new("test"),
    ));
    let telemetry = TelemetryLog::new(store.clone(), clock.clone());
    let signer = ConfigSigner::new([7u8; 32], ISSUER);

    let fetcher = Arc::new(ConfigFetcher::new(
        reqwest::Client::new(),
        ConfigEndpoint::new(base_url, "1.0.0", "14.2", "42").unwrap(),
        SignatureVerifier::new(signer.verifying_key(), ISSUER),
        ConfigCache::new(store.clone()),
        interop,
        sdk.clone(),
        telemetry.clone(),
        clock.clone(),
        StructuredLogger::new("test"),
    ));

    let warnings = Arc::new(CountingWarnings::default());
    let orchestrator = BackgroundOrchestrator::new(
        fetcher,
        Arc::new(padding),
        sdk,
        warnings.clone(),
        telemetry.clone(),
        StructuredLogger::new("test"),
    );

    Fixture {
        store,
        clock,
        telemetry,
        warnings,
        orchestrator,
    }
}

/// Completion handle that counts invocations and keeps the last value
fn counting_completion() -> (CompletionHandle, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(AtomicUsize::new(usize::MAX));
    let handle = {
        let calls = calls.clone();
        let last = last.clone();
        CompletionHandle::new(move |succeeded| {
            calls.fetch_add(1, Ordering::SeqCst);
            last.store(succeeded as usize, Ordering::SeqCst);
        })
    };
    (handle, calls, last)
}

#[tokio::test]
async fn test_all_subtasks_complete_reports_success() {
    let mut server = mockito::Server::new_async().await;
    let f = fixture(&server.url(), StubPadding::ok(), RecordingSdk::default());
    let token = ConfigSigner::new([7u8; 32], ISSUER).sign(BODY.as_bytes(), f.clock.now());
    let mock = server
        .mock("GET", "/v1/config")
        .match_query(mockito::Matcher::Any)
        .with_header("Signature", token.as_str())
        .with_body(BODY)
        .create_async()
        .await;

    let (completion, rx) = CompletionHandle::channel();
    let run = f.orchestrator.run(Duration::from_secs(10), completion).await;

    assert!(run.succeeded);
    assert_eq!(run.config, SubtaskOutcome::Completed(true));
    assert_eq!(run.padding, SubtaskOutcome::Completed(true));
    assert!(rx.await.unwrap());
    assert_eq!(f.warnings.resets.load(Ordering::SeqCst), 1);
    mock.assert_async().await;

    let fake = f.telemetry.entries(Some(TelemetryEventType::FakeRequest));
    assert_eq!(fake.len(), 1);
    assert_eq!(fake[0].payload.as_deref(), Some("200"));
    assert_eq!(fake[0].kind, TelemetryKind::Background);
}

#[tokio::test]
async fn test_failed_subtasks_still_count_as_completed() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let padding = StubPadding {
        result: Err("connection refused".to_string()),
        ..StubPadding::ok()
    };
    let f = fixture(
        &format!("http://127.0.0.1:{}", port),
        padding,
        RecordingSdk::default(),
    );

    let (completion, calls, last) = counting_completion();
    let run = f.orchestrator.run(Duration::from_secs(10), completion).await;

    assert_eq!(run.config, SubtaskOutcome::Completed(false));
    assert_eq!(run.padding, SubtaskOutcome::Completed(false));
    assert!(run.succeeded);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(last.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_config_fetch_fails_run_once() {
    // Accepts connections but never answers
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let f = fixture(&base_url, StubPadding::ok(), RecordingSdk::default());

    let (completion, calls, last) = counting_completion();
    let run = f
        .orchestrator
        .run(Duration::from_millis(200), completion)
        .await;

    assert_eq!(run.config, SubtaskOutcome::Cancelled);
    assert_eq!(run.padding, SubtaskOutcome::Completed(true));
    assert!(!run.succeeded);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(last.load(Ordering::SeqCst), 0);

    // Nothing is committed after the budget expired
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(f.store.get(CONFIG_CACHE_KEY).is_none());
    drop(listener);
}

#[tokio::test]
async fn test_slow_padding_is_cancelled() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let f = fixture(
        &format!("http://127.0.0.1:{}", port),
        StubPadding::slow(Duration::from_secs(30)),
        RecordingSdk::default(),
    );

    let (completion, rx) = CompletionHandle::channel();
    let run = f
        .orchestrator
        .run(Duration::from_millis(100), completion)
        .await;

    assert_eq!(run.padding, SubtaskOutcome::Cancelled);
    assert!(!rx.await.unwrap());
    assert!(f
        .telemetry
        .entries(Some(TelemetryEventType::FakeRequest))
        .is_empty());
}

#[tokio::test]
async fn test_sdk_sync_is_not_joined() {
    let report = SyncReport {
        total_requests: 10,
        errors: vec![
            SyncError::HttpStatus(503),
            SyncError::HttpStatus(503),
            SyncError::HttpStatus(404),
        ],
        key_upload: Some(Ok(200)),
    };
    let sdk = RecordingSdk::with_report(report).with_sync_delay(Duration::from_millis(300));

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let f = fixture(&format!("http://127.0.0.1:{}", port), StubPadding::ok(), sdk);

    let (completion, rx) = CompletionHandle::channel();
    let run = f.orchestrator.run(Duration::from_secs(10), completion).await;

    // Completion is reported while the SDK sync is still running
    assert!(rx.await.unwrap());
    assert!(f.telemetry.entries(Some(TelemetryEventType::Sync)).is_empty());

    assert_eq!(run.sdk_sync.await.unwrap(), "BCH");
    let sync = f.telemetry.entries(Some(TelemetryEventType::Sync));
    assert_eq!(sync[0].payload.as_deref(), Some("BCH"));

    let uploads = f
        .telemetry
        .entries(Some(TelemetryEventType::NextDayKeyUpload));
    assert_eq!(uploads[0].payload.as_deref(), Some("200"));
}

#[tokio::test]
async fn test_old_telemetry_pruned_each_run() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let f = fixture(
        &format!("http://127.0.0.1:{}", port),
        StubPadding::ok(),
        RecordingSdk::default(),
    );

    f.telemetry
        .append(TelemetryEventType::Config, None, TelemetryKind::Foreground);
    f.clock.advance(ChronoDuration::days(15));

    let (completion, _rx) = CompletionHandle::channel();
    f.orchestrator.run(Duration::from_secs(10), completion).await;

    assert!(f
        .telemetry
        .entries(None)
        .iter()
        .all(|e| e.recorded_at > f.clock.now() - ChronoDuration::days(14)));
}

mod completion_props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_completion_fires_once(slow_padding in any::<bool>(), budget_ms in 150u64..400) {
            tokio_test::block_on(async {
                let listener = TcpListener::bind("127.0.0.1:0").unwrap();
                let port = listener.local_addr().unwrap().port();
                drop(listener);

                let padding = if slow_padding {
                    StubPadding::slow(Duration::from_secs(30))
                } else {
                    StubPadding::ok()
                };
                let f = fixture(
                    &format!("http://127.0.0.1:{}", port),
                    padding,
                    RecordingSdk::default(),
                );

                let (completion, calls, last) = counting_completion();
                let run = f
                    .orchestrator
                    .run(Duration::from_millis(budget_ms), completion)
                    .await;

                assert_eq!(calls.load(Ordering::SeqCst), 1);
                assert_eq!(run.succeeded, !slow_padding);
                assert_eq!(last.load(Ordering::SeqCst), run.succeeded as usize);
            });
        }
    }
}
