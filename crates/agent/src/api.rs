//! HTTP API for status, interop user actions, telemetry and Prometheus metrics

use crate::host::{HeadlessSdk, LogNotifier, LogWarnings};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use sync_core::telemetry::TelemetryEventType;
use sync_core::{ConfigLoad, FetchMode, InteropChoice, SyncService};
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SyncService>,
    pub sdk: Arc<HeadlessSdk>,
    pub notifier: Arc<LogNotifier>,
    pub warnings: Arc<LogWarnings>,
}

impl AppState {
    pub fn new(
        service: Arc<SyncService>,
        sdk: Arc<HeadlessSdk>,
        notifier: Arc<LogNotifier>,
        warnings: Arc<LogWarnings>,
    ) -> Self {
        Self {
            service,
            sdk,
            notifier,
            warnings,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChoiceRequest {
    pub choice: InteropChoice,
}

#[derive(Debug, Deserialize)]
pub struct CountriesRequest {
    pub countries: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    pub mode: Option<FetchMode>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TelemetryQuery {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    outcome: &'static str,
    config_version: Option<i64>,
}

/// Engine status overview
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let entry = state.service.cache().entry();
    let interop = state.service.interop().settings();

    Json(json!({
        "config": {
            "version": entry.config.as_ref().map(|c| c.config_version),
            "forceUpdate": entry.config.as_ref().map(|c| c.force_update).unwrap_or(false),
            "lastFetchedAt": entry.last_fetched_at,
            "lastRequestUrl": entry.last_request_url,
        },
        "interop": {
            "state": interop.state,
            "possible": interop.possible,
            "selectedCountries": interop.selected_countries,
            "promptRequired": interop.prompt_required,
        },
        "sdk": state.sdk.snapshot(),
        "notifications": state.notifier.posted().len(),
        "lastWarningReset": state.warnings.last_reset(),
    }))
}

async fn interop_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.interop().settings())
}

async fn apply_choice(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChoiceRequest>,
) -> impl IntoResponse {
    info!(choice = ?request.choice, "Interop choice received");
    Json(state.service.interop().apply_choice(request.choice))
}

async fn available_countries(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.interop().available_countries())
}

async fn select_countries(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CountriesRequest>,
) -> impl IntoResponse {
    Json(state.service.interop().select_countries(request.countries))
}

async fn open_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.interop().open_settings_screen())
}

async fn dismiss_prompt(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.interop().dismiss_prompt())
}

/// Trigger a config load; failures answer 502 with the error kind
async fn refresh_config(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshQuery>,
) -> impl IntoResponse {
    let mode = query.mode.unwrap_or(FetchMode::Foreground);

    match state.service.try_load_config(mode).await {
        Ok(load) => {
            let outcome = match &load {
                ConfigLoad::Fetched(_) => "fetched",
                ConfigLoad::Cached(_) => "cached",
            };
            let response = RefreshResponse {
                outcome,
                config_version: load.config().map(|c| c.config_version),
            };
            (StatusCode::OK, Json(json!(response)))
        }
        Err(e) => {
            warn!(error = %e, "Config refresh requested through API failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.kind(), "message": e.to_string() })),
            )
        }
    }
}

async fn telemetry(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TelemetryQuery>,
) -> impl IntoResponse {
    let filter = match query.event_type.as_deref().map(str::parse::<TelemetryEventType>) {
        None => None,
        Some(Ok(event_type)) => Some(event_type),
        Some(Err(e)) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e })));
        }
    };

    (
        StatusCode::OK,
        Json(json!(state.service.telemetry().entries(filter))),
    )
}

async fn notifications(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.notifier.posted())
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            e.to_string().into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/interop", get(interop_settings))
        .route("/interop/choice", post(apply_choice))
        .route(
            "/interop/countries",
            get(available_countries).post(select_countries),
        )
        .route("/interop/open", post(open_settings))
        .route("/interop/prompt/dismiss", post(dismiss_prompt))
        .route("/config/refresh", post(refresh_config))
        .route("/telemetry", get(telemetry))
        .route("/notifications", get(notifications))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
