//! Capability interface of the exposure-matching SDK
//!
//! The SDK is a black box. The engine only pushes interop settings and
//! tuning parameters into it and asks it to run its own data sync.

use crate::models::SdkParameters;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Interop scope as understood by the SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdkInteropMode {
    Eu,
    Countries,
    Disabled,
}

/// Failure of one request inside an SDK sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Connection torn down mid-request (e.g. a failed certificate check)
    ConnectionReset,
    /// Any other transport-layer failure
    Transport(String),
    /// Backend answered with a non-success status
    HttpStatus(u16),
    /// The request was cancelled before completing
    Cancelled,
    /// Response could not be decoded
    Decode(String),
    Other(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::ConnectionReset => write!(f, "connection reset"),
            SyncError::Transport(msg) => write!(f, "transport error: {}", msg),
            SyncError::HttpStatus(status) => write!(f, "HTTP {}", status),
            SyncError::Cancelled => write!(f, "cancelled"),
            SyncError::Decode(msg) => write!(f, "decode error: {}", msg),
            SyncError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Result of one SDK sync run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Number of requests the sync issued
    pub total_requests: usize,
    /// One entry per failed request
    pub errors: Vec<SyncError>,
    /// Outcome of a pending next-day key upload, if one ran
    pub key_upload: Option<Result<u16, String>>,
}

/// Setters are synchronous and infallible from the engine's point of view.
#[async_trait]
pub trait ExposureSdk: Send + Sync {
    fn set_interop_state(&self, mode: SdkInteropMode);

    fn set_interop_possible(&self, possible: bool);

    fn set_interop_countries(&self, countries: &[String]);

    fn set_interop_selected_countries(&self, countries: &[String]);

    /// Apply tuning parameters from a freshly fetched config
    fn update_parameters(&self, parameters: &SdkParameters);

    /// Run the SDK's own exposure-data sync
    async fn sync(&self) -> SyncReport;
}
