//! Data lake storage
//!
//! Enriched events are persisted write-once as single JSON objects under
//! a time-partitioned key, one object per event:
//!
//! `security-events/year=YYYY/month=MM/day=DD/hour=HH/<event_id>.json`
//!
//! The `ObjectStore` trait is the seam between the pipeline and the
//! backing store; the filesystem implementation below is the local
//! stand-in for a bucket, and the sqlite catalog tracks what was stored.

pub mod catalog;

pub use catalog::{EventCatalog, StoredAlertRow, StoredEventRow};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::models::EnrichedEvent;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),
}

/// Backend-agnostic object storage
///
/// Implementations must be safe for concurrent use; objects are
/// write-once and never rewritten in place.
pub trait ObjectStore: Send + Sync {
    /// Store an object under the given key
    fn put(&self, key: &str, body: &[u8]) -> Result<(), StorageError>;

    /// Fetch an object by key
    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// List keys under a prefix, lexicographically sorted
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Delete an object by key
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Filesystem-backed object store rooted at a directory
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(FsObjectStore { root })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, key: &str, body: &[u8]) -> Result<(), StorageError> {
        let path = self.key_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write via a temp file and rename so readers never observe a
        // partially written object
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.key_path(key);
        if !path.exists() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(fs::read(path)?)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let base = self.root.clone();
        collect_keys(&base, &base, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(key);
        if !path.exists() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }
}

fn collect_keys(base: &Path, dir: &Path, keys: &mut Vec<String>) -> Result<(), StorageError> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_keys(base, &path, keys)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            // Keys use forward slashes regardless of platform
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            keys.push(key);
        }
    }
    Ok(())
}

/// Time-partitioned object key for an enriched event
pub fn partition_key(prefix: &str, event: &EnrichedEvent) -> String {
    let time = event.partition_time();
    format!(
        "{}/year={}/month={}/day={}/hour={}/{}.json",
        prefix,
        time.format("%Y"),
        time.format("%m"),
        time.format("%d"),
        time.format("%H"),
        event.event.event_id
    )
}

/// Writes enriched events into the partitioned layout
pub struct DataLake {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl DataLake {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        DataLake {
            store,
            prefix: prefix.into(),
        }
    }

    /// Persist an enriched event; returns the object key
    pub fn write_event(&self, event: &EnrichedEvent) -> Result<String, StorageError> {
        let key = partition_key(&self.prefix, event);
        let body = serde_json::to_vec_pretty(event)?;
        self.store.put(&key, &body)?;
        log::debug!("Stored event {} at {}", event.event.event_id, key);
        Ok(key)
    }

    /// Read an enriched event back by key
    pub fn read_event(&self, key: &str) -> Result<EnrichedEvent, StorageError> {
        let body = self.store.get(key)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// List stored event keys, optionally under a partition subpath.
    /// The delimiter keeps a sibling prefix like `security-events-x`
    /// out of the listing.
    pub fn list_events(&self, subpath: Option<&str>) -> Result<Vec<String>, StorageError> {
        let prefix = match subpath {
            Some(sub) => format!("{}/{}", self.prefix, sub),
            None => format!("{}/", self.prefix),
        };
        self.store.list(&prefix)
    }

    /// Delete a stored object (used by retention pruning only)
    pub fn delete_event(&self, key: &str) -> Result<(), StorageError> {
        self.store.delete(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventKind, SecurityEvent, ThreatIntel};
    use chrono::{TimeZone, Utc};

    fn enriched_at(ts: chrono::DateTime<Utc>) -> EnrichedEvent {
        let mut event = SecurityEvent::new(EventKind::Custom, serde_json::json!({"x": 1}));
        event.event_time = Some(ts);
        EnrichedEvent {
            event,
            processed_at: Utc::now(),
            risk_score: 55,
            threat_intel: ThreatIntel::clear(),
            geo_info: None,
        }
    }

    #[test]
    fn test_partition_key_layout() {
        let event = enriched_at(Utc.with_ymd_and_hms(2025, 6, 1, 3, 7, 0).unwrap());
        let key = partition_key("security-events", &event);
        assert_eq!(
            key,
            format!(
                "security-events/year=2025/month=06/day=01/hour=03/{}.json",
                event.event.event_id
            )
        );
    }

    #[test]
    fn test_fs_store_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path()).unwrap();

        store.put("a/b/c.json", b"{}").unwrap();
        assert_eq!(store.get("a/b/c.json").unwrap(), b"{}");
        assert!(matches!(
            store.get("a/b/missing.json"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_fs_store_list_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path()).unwrap();

        store.put("events/year=2025/a.json", b"{}").unwrap();
        store.put("events/year=2025/b.json", b"{}").unwrap();
        store.put("other/c.json", b"{}").unwrap();

        let keys = store.list("events/").unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.starts_with("events/")));
    }

    #[test]
    fn test_fs_store_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path()).unwrap();
        store.put("k.json", b"{}").unwrap();
        store.delete("k.json").unwrap();
        assert!(matches!(store.get("k.json"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_fs_store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path()).unwrap();
        store.put("events/e.json", b"{\"k\": true}").unwrap();

        let keys = store.list("").unwrap();
        assert_eq!(keys, vec!["events/e.json"]);
    }

    #[test]
    fn test_data_lake_write_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsObjectStore::new(dir.path()).unwrap());
        let lake = DataLake::new(store, "security-events");

        let event = enriched_at(Utc.with_ymd_and_hms(2025, 6, 1, 14, 0, 0).unwrap());
        let key = lake.write_event(&event).unwrap();
        assert!(key.starts_with("security-events/year=2025/month=06/day=01/hour=14/"));

        let read_back = lake.read_event(&key).unwrap();
        assert_eq!(read_back.event.event_id, event.event.event_id);
        assert_eq!(read_back.risk_score, 55);

        let listed = lake.list_events(None).unwrap();
        assert_eq!(listed, vec![key]);
    }

    #[test]
    fn test_data_lake_list_excludes_sibling_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsObjectStore::new(dir.path()).unwrap());
        store
            .put("security-events-archive/year=2025/stale.json", b"{}")
            .unwrap();

        let lake = DataLake::new(store, "security-events");
        let event = enriched_at(Utc.with_ymd_and_hms(2025, 6, 1, 14, 0, 0).unwrap());
        let key = lake.write_event(&event).unwrap();

        assert_eq!(lake.list_events(None).unwrap(), vec![key]);
    }
}
