//! Signed remote config synchronization
//!
//! This module decides when the config is due ([`should_refresh`]), fetches
//! it, validates the detached signature and commits it to the cache before
//! handing it to interop reconciliation.

mod cache;
mod endpoint;
mod fetcher;
mod signature;
mod staleness;


pub use cache::{ConfigCache, CONFIG_CACHE_KEY};
pub use endpoint::ConfigEndpoint;
pub use fetcher::{ConfigFetcher, ConfigLoad};
pub use signature::{content_hash, ConfigClaims, ConfigSigner, SignatureVerifier, SIGNATURE_HEADER};
pub use staleness::{should_refresh, FetchMode, BACKGROUND_TTL_SECS, FOREGROUND_TTL_SECS};
