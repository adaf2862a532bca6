//! Telemetry log and sync outcome encoding

mod classifier;
mod log;

pub use classifier::{classify, encode_count, SyncAttemptResult, SyncOutcomeCounts};
pub use log::{
    TelemetryEntry, TelemetryEventType, TelemetryKind, TelemetryLog, TELEMETRY_LOG_KEY,
    TELEMETRY_RETENTION_DAYS,
};
