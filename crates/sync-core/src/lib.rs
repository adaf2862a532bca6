//! Config sync and interop consistency engine
//!
//! This crate provides the core functionality for:
//! - Signed remote config fetching with staleness control
//! - Cross-region sharing mode reconciliation
//! - Background execution window orchestration
//! - Sync outcome telemetry and observability

pub mod background;
pub mod clock;
pub mod config_sync;
pub mod error;
pub mod interop;
pub mod models;
pub mod observability;
pub mod sdk;
pub mod service;
pub mod store;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use background::{BackgroundRun, CompletionHandle, SubtaskOutcome};
pub use config_sync::{ConfigLoad, FetchMode};
pub use error::{FetchError, StoreError, VerificationError};
pub use interop::{InteropChoice, InteropSettings, InteropState};
pub use models::*;
pub use observability::{StructuredLogger, SyncMetrics};
pub use service::{SyncService, SyncServiceBuilder};
