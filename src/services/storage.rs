//! Persistent key-value state
//!
//! Values are JSON text under versioned namespace keys. Every helper in this
//! module degrades instead of failing: an unreadable store reads as empty and
//! a failed write is logged and dropped.

use crate::constants::SNAPSHOT_TIMESTAMP_FIELD;
use crate::error::{AppError, Result};
use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// String key-value store, the persistence port of every view
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// Volatile store for tests and for running without a usable state file
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// All keys in one JSON document on disk
///
/// The document is read once on open and rewritten (temp file + rename) on
/// every `set`.
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store; a missing file is an empty store, a corrupt one is
    /// logged and replaced on the next write
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, String>>(&text) {
                Ok(values) => {
                    info!(path = %path.display(), keys = values.len(), "Loaded state file");
                    values
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "State file is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No state file yet");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read state file, starting empty");
                BTreeMap::new()
            }
        };

        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.to_string());
        self.flush(&values)
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", self.path.display(), e)))
    }
}

/// Last snapshot under `key` when it is a JSON object
pub fn load_object(store: &dyn KeyValueStore, key: &str) -> Option<Map<String, Value>> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "Failed to read state");
            return None;
        }
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!(key, "Stored state is not an object, ignoring");
            None
        }
        Err(e) => {
            warn!(key, error = %e, "Stored state is malformed, ignoring");
            None
        }
    }
}

/// Read-modify-write: overlay `partial` on the last snapshot and stamp it
pub fn merge_write(store: &dyn KeyValueStore, key: &str, partial: Map<String, Value>) {
    let mut next = load_object(store, key).unwrap_or_default();
    next.extend(partial);
    next.insert(
        SNAPSHOT_TIMESTAMP_FIELD.to_string(),
        Value::from(Utc::now().timestamp_millis()),
    );

    let text = Value::Object(next).to_string();
    if let Err(e) = store.set(key, &text) {
        warn!(key, error = %e, "Failed to persist state");
    }
}

/// Whole-value read; `None` when absent or not decodable as `T`
pub fn get_value<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(key, error = %e, "Failed to read value");
            return None;
        }
    };
    serde_json::from_str(&raw)
        .map_err(|e| warn!(key, error = %e, "Stored value is malformed, ignoring"))
        .ok()
}

/// Whole-value overwrite
pub fn set_value<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
    let result = serde_json::to_string(value)
        .map_err(AppError::from)
        .and_then(|text| store.set(key, &text));
    if let Err(e) = result {
        warn!(key, error = %e, "Failed to persist value");
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_merge_write_keeps_prior_fields() {
        let store = MemoryStore::new();
        merge_write(&store, "k", object(json!({"tf": "1m", "range": "1d"})));
        merge_write(&store, "k", object(json!({"range": "5d"})));

        let snapshot = load_object(&store, "k").unwrap();
        assert_eq!(snapshot["tf"], "1m");
        assert_eq!(snapshot["range"], "5d");
        assert!(snapshot[SNAPSHOT_TIMESTAMP_FIELD].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_malformed_snapshot_reads_as_none() {
        let store = MemoryStore::new();
        store.set("k", "{not json").unwrap();
        assert!(load_object(&store, "k").is_none());

        store.set("k", "[1,2]").unwrap();
        assert!(load_object(&store, "k").is_none());

        // and a merge write replaces it
        merge_write(&store, "k", object(json!({"q": "TENCENT"})));
        assert_eq!(load_object(&store, "k").unwrap()["q"], "TENCENT");
    }

    #[test]
    fn test_values_round_trip_and_fall_back() {
        let store = MemoryStore::new();
        assert_eq!(get_value::<Vec<String>>(&store, "list"), None);

        set_value(&store, "list", &vec!["A".to_string(), "B".to_string()]);
        assert_eq!(
            get_value::<Vec<String>>(&store, "list"),
            Some(vec!["A".to_string(), "B".to_string()])
        );
        assert_eq!(get_value::<u32>(&store, "list"), None);
    }

    #[test]
    fn test_write_failures_are_swallowed() {
        let store = testing::BrokenStore::default();
        merge_write(&store, "k", object(json!({"q": "X"})));
        set_value(&store, "k", &1);
        assert!(load_object(&store, "k").is_none());
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::open(&path);
        merge_write(&store, "quotedesk.app.v1", object(json!({"tab": "compare"})));
        drop(store);

        let reopened = FileStore::open(&path);
        let snapshot = load_object(&reopened, "quotedesk.app.v1").unwrap();
        assert_eq!(snapshot["tab"], "compare");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_tolerates_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "garbage").unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.get("anything").unwrap(), None);

        store.set("k", "\"v\"").unwrap();
        assert_eq!(FileStore::open(&path).get("k").unwrap(), Some("\"v\"".to_string()));
    }
}
