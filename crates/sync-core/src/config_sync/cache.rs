//! Persisted view of the last known good configuration

use crate::error::StoreError;
use crate::models::{ConfigCacheEntry, RemoteConfig};
use crate::store::{KeyValueStore, KeyValueStoreExt};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Store key holding the serialized `ConfigCacheEntry`
pub const CONFIG_CACHE_KEY: &str = "config.cacheEntry";

/// Typed access to the cached config entry.
///
/// Readers are free to clone this handle; only `ConfigFetcher` commits.
#[derive(Clone)]
pub struct ConfigCache {
    store: Arc<dyn KeyValueStore>,
}

impl ConfigCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current entry, or the empty default on first access
    pub fn entry(&self) -> ConfigCacheEntry {
        self.store
            .get_as::<ConfigCacheEntry>(CONFIG_CACHE_KEY)
            .unwrap_or_default()
    }

    pub fn current(&self) -> Option<RemoteConfig> {
        self.entry().config
    }

    /// Overwrite the entry in a single store write
    pub(crate) fn commit(
        &self,
        config: &RemoteConfig,
        fetched_at: DateTime<Utc>,
        request_url: &str,
    ) -> Result<(), StoreError> {
        let entry = ConfigCacheEntry {
            config: Some(config.clone()),
            last_fetched_at: Some(fetched_at),
            last_request_url: Some(request_url.to_string()),
        };
        self.store.set_as(CONFIG_CACHE_KEY, &entry)
    }
}
