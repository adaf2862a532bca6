//! Durable key-value storage for cached config, interop settings and telemetry
//!
//! This module provides:
//! - The `KeyValueStore` seam the rest of the engine persists through
//! - An in-memory store for tests and ephemeral hosts
//! - A JSON file store with atomic temp-file writes

use crate::error::StoreError;
use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Simple durable map
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key was never written
    fn get(&self, key: &str) -> Option<Value>;

    /// Write a value; durable once this returns `Ok`
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Typed helpers on top of any `KeyValueStore`
pub trait KeyValueStoreExt: KeyValueStore {
    /// Decode a stored value, treating undecodable values as absent
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable stored value");
                None
            }
        }
    }

    fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.set(key, value)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of every entry, used to compare store contents across operations
    pub fn snapshot(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store persisted as one JSON document, rewritten on every `set`
pub struct FileStore {
    path: PathBuf,
    entries: DashMap<String, Value>,
    /// Serializes document rewrites
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store at `path`, loading any existing document
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let store = Self {
            entries: DashMap::new(),
            write_lock: Mutex::new(()),
            path,
        };

        if store.path.exists() {
            if let Err(e) = store.load_from_disk() {
                warn!(
                    path = %store.path.display(),
                    error = %e,
                    "Failed to load persisted store, starting fresh"
                );
            }
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(&self) -> Result<()> {
        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open store file {:?}", self.path))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .context("Failed to read store file")?;

        let document: Map<String, Value> =
            serde_json::from_slice(&data).context("Failed to deserialize store file")?;

        for (key, value) in document {
            self.entries.insert(key, value);
        }

        info!(path = %self.path.display(), keys = self.entries.len(), "Loaded store from disk");
        Ok(())
    }

    fn save_to_disk(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let document: Map<String, Value> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let json = serde_json::to_vec_pretty(&document).context("Failed to serialize store")?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;

        file.write_all(&json).context("Failed to write store data")?;
        file.sync_all().context("Failed to sync store file")?;

        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, self.path))?;

        debug!(path = %self.path.display(), keys = document.len(), "Store flushed to disk");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let previous = self.entries.insert(key.to_string(), value);

        if let Err(e) = self.save_to_disk() {
            // Keep memory and disk in agreement
            match previous {
                Some(v) => {
                    self.entries.insert(key.to_string(), v);
                }
                None => {
                    self.entries.remove(key);
                }
            }
            return Err(StoreError::Persist(e));
        }

        Ok(())
    }
}
