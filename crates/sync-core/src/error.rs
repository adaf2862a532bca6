//! Error taxonomy for the config sync engine
//!
//! None of these errors is fatal. Every failure path leaves the cached
//! configuration and interop settings as they were and lets the next
//! scheduling opportunity retry.

use thiserror::Error;

/// Reasons a signed configuration response is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// The response carried no signature header
    #[error("signature header missing from response")]
    MissingSignature,
    /// The token is malformed, uses the wrong algorithm, was signed by
    /// another key or names an unexpected issuer
    #[error("signature token is invalid: {0}")]
    InvalidSignature(String),
    /// The token is expired or not yet valid
    #[error("signature claims are outside their validity window")]
    ExpiredClaim,
    /// The body digest does not match the signed content hash
    #[error("response body does not match signed content hash")]
    ContentHashMismatch,
}

/// Failure of a single config fetch attempt
#[derive(Debug, Error)]
pub enum FetchError {
    /// No response or a transport-level failure
    #[error("config request failed: {0}")]
    Network(String),

    #[error("config response rejected: {0}")]
    Verification(#[from] VerificationError),

    /// Body passed verification but is not a valid config document
    #[error("config body could not be parsed: {0}")]
    Parse(String),

    /// The execution window closed before the fetch could commit
    #[error("config fetch cancelled")]
    Cancelled,

    /// The verified config could not be written to the cache
    #[error("config could not be stored: {0}")]
    Persist(#[from] StoreError),
}

impl FetchError {
    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Verification(_) => "verification",
            FetchError::Parse(_) => "parse",
            FetchError::Cancelled => "cancelled",
            FetchError::Persist(_) => "persist",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

/// Persistent store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to encode value for key {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to persist store: {0}")]
    Persist(#[from] anyhow::Error),
}
