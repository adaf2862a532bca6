//! Integration tests for the agent API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use std::sync::Arc;
use sync_agent::{
    api::{create_router, AppState},
    build_service,
    config::AgentConfig,
    host::{HeadlessSdk, LogNotifier, LogWarnings},
};
use sync_core::config_sync::{ConfigSigner, SIGNATURE_HEADER};
use sync_core::store::MemoryStore;
use tower::ServiceExt;

const SECRET: [u8; 32] = [7u8; 32];
const ISSUER: &str = "config-service";
const BODY: &str = r#"{
    "configVersion": 3,
    "euSharingEnabled": true,
    "euSharingCountries": [
        {"countryCode": "DE", "countryNameEN": "Germany"},
        {"countryCode": "FR", "countryNameEN": "France"}
    ]
}"#;

fn setup_test_app(base_url: &str) -> (Router, Arc<AppState>) {
    let signer = ConfigSigner::new(SECRET, ISSUER);
    let config = AgentConfig {
        config_base_url: base_url.to_string(),
        padding_url: format!("{}/v1/padding", base_url),
        public_key_hex: signer.public_key_hex(),
        issuer: ISSUER.to_string(),
        request_timeout_secs: 5,
        ..AgentConfig::default()
    };

    let sdk = Arc::new(HeadlessSdk::default());
    let notifier = Arc::new(LogNotifier::default());
    let warnings = Arc::new(LogWarnings::default());
    let service = build_service(
        &config,
        Arc::new(MemoryStore::new()),
        sdk.clone(),
        notifier.clone(),
        warnings.clone(),
    )
    .unwrap();

    let state = Arc::new(AppState::new(Arc::new(service), sdk, notifier, warnings));
    (create_router(state.clone()), state)
}

/// Base URL nothing listens on
fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    format!("http://127.0.0.1:{}", port)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_status_reports_defaults() {
    let (app, _state) = setup_test_app(&unreachable_url());

    let (status, body) = send(&app, get("/status")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config"]["version"], serde_json::Value::Null);
    assert_eq!(body["interop"]["state"], "legacy");
    assert_eq!(body["interop"]["promptRequired"], true);
    assert_eq!(body["notifications"], 0);
}

#[tokio::test]
async fn test_interop_choice_updates_sdk() {
    let (app, state) = setup_test_app(&unreachable_url());

    let (status, body) = send(
        &app,
        post_json("/interop/choice", serde_json::json!({ "choice": "eu" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "eu");

    let (_, status_body) = send(&app, get("/status")).await;
    assert_eq!(status_body["sdk"]["mode"], "eu");
    assert_eq!(state.service.interop().state().as_str(), "eu");
}

#[tokio::test]
async fn test_unknown_choice_rejected() {
    let (app, _state) = setup_test_app(&unreachable_url());

    let (status, _) = send(
        &app,
        post_json("/interop/choice", serde_json::json!({ "choice": "world" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_select_countries_and_open_settings() {
    let (app, _state) = setup_test_app(&unreachable_url());

    send(
        &app,
        post_json("/interop/choice", serde_json::json!({ "choice": "countries" })),
    )
    .await;
    let (status, body) = send(
        &app,
        post_json(
            "/interop/countries",
            serde_json::json!({ "countries": ["IT", "DE"] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selectedCountries"], serde_json::json!(["DE", "IT"]));

    let (status, body) = send(&app, post_empty("/interop/open")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "countries");
}

#[tokio::test]
async fn test_dismiss_prompt() {
    let (app, _state) = setup_test_app(&unreachable_url());

    let (status, body) = send(&app, post_empty("/interop/prompt/dismiss")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["promptRequired"], false);
}

#[tokio::test]
async fn test_refresh_fetches_then_serves_cache() {
    let mut server = mockito::Server::new_async().await;
    let token = ConfigSigner::new(SECRET, ISSUER).sign(BODY.as_bytes(), Utc::now());
    let mock = server
        .mock("GET", "/v1/config")
        .match_query(mockito::Matcher::Any)
        .with_header(SIGNATURE_HEADER, token.as_str())
        .with_body(BODY)
        .expect(1)
        .create_async()
        .await;

    let (app, state) = setup_test_app(&server.url());

    let (status, body) = send(&app, post_empty("/config/refresh")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "fetched");
    assert_eq!(body["configVersion"], 3);

    let (status, body) = send(&app, post_empty("/config/refresh?mode=background")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "cached");
    mock.assert_async().await;

    let (_, countries) = send(&app, get("/interop/countries")).await;
    assert_eq!(countries.as_array().unwrap().len(), 2);
    assert_eq!(state.sdk.snapshot().countries, vec!["DE", "FR"]);

    let (_, telemetry) = send(&app, get("/telemetry?type=config")).await;
    assert_eq!(telemetry.as_array().unwrap().len(), 1);
    assert_eq!(telemetry[0]["kind"], "foreground");
}

#[tokio::test]
async fn test_refresh_failure_returns_bad_gateway() {
    let (app, _state) = setup_test_app(&unreachable_url());

    let (status, body) = send(&app, post_empty("/config/refresh")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "network");
}

#[tokio::test]
async fn test_telemetry_rejects_unknown_type() {
    let (app, _state) = setup_test_app(&unreachable_url());

    let (status, body) = send(&app, get("/telemetry?type=bogus")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("bogus"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _state) = setup_test_app(&unreachable_url());

    let response = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("sync_agent_config_version"));
}
