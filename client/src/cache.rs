//! Last-known-good cache for dashboard resources.
//!
//! DESIGN
//! ======
//! One entry per tracked resource, keyed by `Category::cache_key`. Every
//! successful live push or poll fetch overwrites its entry; entries are only
//! read when neither live delivery nor polling produced data. An entry older
//! than the freshness window is a miss and is removed on read.
//!
//! Writers never merge: the last write to land wins. `FileCache` writes to a
//! temporary file and renames it into place so a reader never sees a
//! partially written entry. Its I/O goes through `tokio::fs` and never blocks
//! a runtime worker.
//!
//! ERROR HANDLING
//! ==============
//! `read_fresh` and `write_entry` log store failures and degrade to a miss or
//! a skipped write. Cache problems never reach the dashboard consumer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    /// Epoch ms when the payload was captured.
    pub captured_at: i64,
    pub payload: Value,
}

impl CacheEntry {
    #[must_use]
    pub fn new(key: impl Into<String>, payload: Value, captured_at: i64) -> Self {
        Self { key: key.into(), captured_at, payload }
    }

    /// Servable while strictly younger than `window`.
    #[must_use]
    pub fn is_fresh_at(&self, now_ms: i64, window: Duration) -> bool {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.captured_at) < window_ms
    }
}

/// On-disk value shape: `{"timestamp": <epoch ms>, "data": <payload>}`.
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    timestamp: i64,
    data: Value,
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Raw entry regardless of age.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read or decoded.
    async fn read(&self, key: &str) -> Result<Option<CacheEntry>, ClientError>;

    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    async fn write(&self, entry: &CacheEntry) -> Result<(), ClientError>;

    /// # Errors
    ///
    /// Returns an error if the backing store cannot be modified.
    async fn remove(&self, key: &str) -> Result<(), ClientError>;
}

// =============================================================================
// MEMORY
// =============================================================================

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn read(&self, key: &str) -> Result<Option<CacheEntry>, ClientError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn write(&self, entry: &CacheEntry) -> Result<(), ClientError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ClientError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// One JSON file per entry: `<dir>/dashboard_<key>.json`.
pub struct FileCache {
    dir: PathBuf,
    write_seq: AtomicU64,
}

impl FileCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), write_seq: AtomicU64::new(0) }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("dashboard_{key}.json"))
    }
}

#[async_trait]
impl CacheStore for FileCache {
    async fn read(&self, key: &str) -> Result<Option<CacheEntry>, ClientError> {
        let bytes = match fs::read(self.path_for(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredEntry = serde_json::from_slice(&bytes)?;
        Ok(Some(CacheEntry { key: key.to_owned(), captured_at: stored.timestamp, payload: stored.data }))
    }

    async fn write(&self, entry: &CacheEntry) -> Result<(), ClientError> {
        fs::create_dir_all(&self.dir).await?;
        let stored = StoredEntry { timestamp: entry.captured_at, data: entry.payload.clone() };
        let bytes = serde_json::to_vec(&stored)?;
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self.dir.join(format!(".dashboard_{}.json.{seq}.tmp", entry.key));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, self.path_for(&entry.key)).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ClientError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Entry for `key` if it is still fresh at `now_ms`. Stale entries are removed.
pub async fn read_fresh(store: &dyn CacheStore, key: &str, now_ms: i64, window: Duration) -> Option<CacheEntry> {
    let entry = match store.read(key).await {
        Ok(entry) => entry?,
        Err(e) => {
            warn!(key, error = %e, "cache: read failed");
            return None;
        }
    };
    if entry.is_fresh_at(now_ms, window) {
        return Some(entry);
    }
    debug!(key, captured_at = entry.captured_at, "cache: entry stale; removing");
    if let Err(e) = store.remove(key).await {
        warn!(key, error = %e, "cache: failed to remove stale entry");
    }
    None
}

pub async fn write_entry(store: &dyn CacheStore, key: &str, payload: Value, now_ms: i64) {
    if let Err(e) = store.write(&CacheEntry::new(key, payload, now_ms)).await {
        warn!(key, error = %e, "cache: write failed");
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
