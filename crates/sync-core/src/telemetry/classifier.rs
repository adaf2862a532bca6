//! Classification of SDK sync results into a three-letter telemetry code

use crate::sdk::{SyncError, SyncReport};
use serde::Serialize;
use std::fmt;

/// Symbols available for each bucket; counts past the last one clamp to `Z`
const ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncAttemptResult {
    Success,
    InstantError,
    DelayedError,
}

/// Bucket a single request error.
///
/// Transient conditions are delayed errors; anything else is instant.
pub fn classify(error: &SyncError) -> SyncAttemptResult {
    match error {
        SyncError::ConnectionReset
        | SyncError::Transport(_)
        | SyncError::HttpStatus(502)
        | SyncError::HttpStatus(503)
        | SyncError::Cancelled => SyncAttemptResult::DelayedError,
        SyncError::HttpStatus(_) | SyncError::Decode(_) | SyncError::Other(_) => {
            SyncAttemptResult::InstantError
        }
    }
}

/// Map a count onto `A..=Z`
pub fn encode_count(count: usize) -> char {
    ALPHABET[count.min(ALPHABET.len() - 1)] as char
}

/// Per-bucket counts for one SDK sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcomeCounts {
    pub instant: usize,
    pub delayed: usize,
    pub success: usize,
}

impl SyncOutcomeCounts {
    pub fn from_report(report: &SyncReport) -> Self {
        Self::from_errors(report.total_requests, &report.errors)
    }

    pub fn from_errors(total_requests: usize, errors: &[SyncError]) -> Self {
        let mut counts = Self {
            success: total_requests.saturating_sub(errors.len()),
            ..Self::default()
        };
        for error in errors {
            match classify(error) {
                SyncAttemptResult::InstantError => counts.instant += 1,
                SyncAttemptResult::DelayedError => counts.delayed += 1,
                SyncAttemptResult::Success => counts.success += 1,
            }
        }
        counts
    }

    /// Telemetry code: instant, delayed, success
    pub fn code(&self) -> String {
        [self.instant, self.delayed, self.success]
            .into_iter()
            .map(encode_count)
            .collect()
    }

    /// Read a code back. Clamped buckets come back as 25.
    pub fn parse_code(code: &str) -> Option<Self> {
        let mut counts = code.bytes().map(|b| ALPHABET.iter().position(|&a| a == b));
        let parsed = Self {
            instant: counts.next()??,
            delayed: counts.next()??,
            success: counts.next()??,
        };
        counts.next().is_none().then_some(parsed)
    }
}

impl fmt::Display for SyncOutcomeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}
