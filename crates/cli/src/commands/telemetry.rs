//! Telemetry log commands

use anyhow::Result;
use serde::Serialize;
use sync_core::telemetry::{SyncOutcomeCounts, TelemetryEntry, TelemetryEventType};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{format_timestamp, print_table, OutputFormat};

/// Row for the telemetry table
#[derive(Tabled, Serialize)]
struct TelemetryRow {
    #[tabled(rename = "Recorded")]
    recorded_at: String,
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Payload")]
    payload: String,
}

/// Render a payload, expanding sync outcome codes
fn describe_payload(entry: &TelemetryEntry) -> String {
    let Some(payload) = entry.payload.as_deref() else {
        return "-".to_string();
    };

    match entry.event_type {
        TelemetryEventType::Sync => match SyncOutcomeCounts::parse_code(payload) {
            Some(counts) => format!(
                "{} (instant {}, delayed {}, ok {})",
                payload, counts.instant, counts.delayed, counts.success
            ),
            None => payload.to_string(),
        },
        _ => payload.to_string(),
    }
}

/// List telemetry entries, optionally of a single type
pub async fn list_entries(
    client: &ApiClient,
    event_type: Option<TelemetryEventType>,
    format: OutputFormat,
) -> Result<()> {
    let path = match event_type {
        Some(t) => format!("telemetry?type={}", t.as_str()),
        None => "telemetry".to_string(),
    };
    let entries: Vec<TelemetryEntry> = client.get(&path).await?;

    let rows: Vec<TelemetryRow> = entries
        .iter()
        .map(|e| TelemetryRow {
            recorded_at: format_timestamp(Some(e.recorded_at)),
            event: e.event_type.to_string(),
            kind: format!("{:?}", e.kind).to_lowercase(),
            payload: describe_payload(e),
        })
        .collect();

    print_table(&rows, format);
    Ok(())
}
