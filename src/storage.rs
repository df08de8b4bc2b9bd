use crate::errors::StoreError;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{error, warn};

pub const COMPLETED_KEY: &str = "completedDays_byMonth";
pub const BADGES_KEY: &str = "unlockedBadges";
pub const LEGACY_HABITS_KEY: &str = "habits";
pub const REFLECTION_PREFIX: &str = "reflection_";
pub const NOTIFIED_PREFIX: &str = "notified_";

/// Synchronous string key-value store, shaped like browser local storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Reads `key` as JSON. A missing key and an unparsable value both come back
/// as `None`; only store failures are errors.
pub fn read_json<S: KeyValueStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<Option<Value>, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!("ignoring malformed value under '{key}': {err}");
            Ok(None)
        }
    }
}

pub fn write_json<S, T>(store: &mut S, key: &str, value: &T) -> Result<(), StoreError>
where
    S: KeyValueStore + ?Sized,
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, payload)
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// The whole key-value map kept in one JSON file. Every mutation rewrites the
/// file and is only applied in memory once the write went through.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub async fn open(path: PathBuf) -> Self {
        let entries = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(err) => {
                    error!("failed to parse store file {}: {err}", path.display());
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                error!("failed to read store file {}: {err}", path.display());
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&mut self, entries: BTreeMap<String, String>) -> Result<(), StoreError> {
        let payload = serde_json::to_vec_pretty(&entries).map_err(|source| StoreError::Encode {
            key: self.path.display().to_string(),
            source,
        })?;
        write_file(&self.path, &payload).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.entries = entries;
        Ok(())
    }
}

// The store trait is synchronous, so on a worker thread the write is moved off
// the scheduler. Current-thread runtimes cannot do that and write inline.
fn write_file(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| std::fs::write(path, payload))
        }
        _ => std::fs::write(path, payload),
    }
}

/// Wraps a `MemoryStore`; writes always fail, reads fail when `fail_reads`.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingStore {
    pub inner: MemoryStore,
    pub fail_reads: bool,
}

#[cfg(test)]
impl FailingStore {
    pub fn unreadable() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_reads: true,
        }
    }

    pub fn read_only(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_reads: false,
        }
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads {
            return Err(StoreError::Unavailable("store unreachable".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_reads()?;
        self.inner.get(key)
    }

    fn set(&mut self, _key: &str, _value: String) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("quota exceeded".into()))
    }

    fn remove(&mut self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("quota exceeded".into()))
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.check_reads()?;
        self.inner.keys()
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.clone();
        entries.insert(key.to_string(), value);
        self.commit(entries)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        let mut entries = self.entries.clone();
        entries.remove(key);
        self.commit(entries)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "habit_tracker_{name}_{}_{nanos}.json",
            std::process::id()
        ))
    }

    #[test]
    fn read_json_treats_garbage_as_missing() {
        let mut store = MemoryStore::new();
        store.set("k", "{not json".to_string()).unwrap();
        assert!(read_json(&store, "k").unwrap().is_none());
        assert!(read_json(&store, "absent").unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn file_store_round_trips_through_disk() {
        let path = temp_path("roundtrip");
        let mut store = FileStore::open(path.clone()).await;
        store.set("a", "1".to_string()).unwrap();
        store.set("b", "2".to_string()).unwrap();
        store.remove("a").unwrap();

        let reopened = FileStore::open(path.clone()).await;
        assert_eq!(reopened.get("a").unwrap(), None);
        assert_eq!(reopened.get("b").unwrap().as_deref(), Some("2"));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn file_store_surfaces_write_failures() {
        let dir = temp_path("missing_dir");
        let mut store = FileStore::open(dir.join("nested").join("store.json")).await;
        let err = store.set("a", "1".to_string()).unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_starts_empty_on_corrupt_file() {
        let path = temp_path("corrupt");
        std::fs::write(&path, b"[1, 2").unwrap();
        let store = FileStore::open(path.clone()).await;
        assert!(store.keys().unwrap().is_empty());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn file_store_writes_outside_a_runtime() {
        let path = temp_path("no_runtime");
        let mut store = FileStore {
            path: path.clone(),
            entries: BTreeMap::new(),
        };
        store.set("a", "1".to_string()).unwrap();
        let on_disk: BTreeMap<String, String> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.get("a").map(String::as_str), Some("1"));
        let _ = std::fs::remove_file(path);
    }
}
