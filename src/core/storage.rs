//! Storage traits - Abstract interface for local persisted state
//!
//! Everything the console keeps across restarts (notifications, preferences,
//! connection settings) goes through [`KeyValueStore`]:
//! - `FileStore`: one JSON file per key under the state directory
//! - `MemoryStore`: process-local map, for tests and `--ephemeral` sessions
//!
//! [`StateStore`] layers typed JSON access on top and owns corruption
//! handling: an unreadable value is logged once per key and treated as absent.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

use crate::error::{Error, Result};

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Abstract interface for string key-value storage
///
/// Implementations are synchronous: callers persist on every mutation and
/// expect the write to have happened (or failed) by the time they return.
pub trait KeyValueStore: Send + Sync {
    /// Get the backend ID
    fn id(&self) -> &str;

    /// Retrieve a raw value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a raw value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value (missing keys are fine)
    fn remove(&self, key: &str) -> Result<()>;

    /// Delete every value
    fn clear(&self) -> Result<()>;
}

fn validate_key(key: &str) -> Result<()> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !key.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid storage key: {:?}", key)))
    }
}

/// File-backed store: `<dir>/<key>.json`
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir` (created lazily on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn id(&self) -> &str {
        "file"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("Failed to read {}: {}", path.display(), e))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Storage(format!("Failed to create {}: {}", self.dir.display(), e)))?;

        // Write-then-rename so a crash never leaves a half-written value
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        std::fs::write(&tmp, value)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", path.display(), e)))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("Failed to remove {}: {}", path.display(), e))),
        }
    }

    fn clear(&self) -> Result<()> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::Storage(e.to_string())),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

/// In-memory store
///
/// `fail_writes(true)` makes every `set` fail, which is how a full or
/// disabled storage backend looks to callers.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate quota exhaustion / disabled storage
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Store a raw value, bypassing failure injection
    pub fn seed(&self, key: &str, value: &str) {
        lock(&self.values).insert(key.to_string(), value.to_string());
    }
}

impl KeyValueStore for MemoryStore {
    fn id(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage("quota exceeded".to_string()));
        }
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.values).remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        lock(&self.values).clear();
        Ok(())
    }
}

/// Typed JSON access over a [`KeyValueStore`]
#[derive(Clone)]
pub struct StateStore {
    backend: Arc<dyn KeyValueStore>,
    warned: Arc<Mutex<HashSet<String>>>,
}

impl StateStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        StateStore {
            backend,
            warned: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Convenience constructor for a session-only store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Underlying backend
    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    /// Load and decode a value.
    ///
    /// Returns `None` when the key is absent, unreadable or corrupt. Never fails.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                self.warn_once(key, &format!("read failed: {}", e));
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                self.warn_once(key, &format!("corrupt value ignored: {}", e));
                None
            }
        }
    }

    /// Encode and persist a value
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.backend.set(key, &raw)
    }

    /// Persist a value, logging instead of failing.
    ///
    /// Returns whether the write succeeded; in-memory state stays authoritative
    /// either way.
    pub fn save_best_effort<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match self.save(key, value) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, backend = self.backend.id(), "Failed to persist state: {}", e);
                false
            }
        }
    }

    /// Read a raw string value (for non-JSON encodings)
    pub fn load_raw(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                self.warn_once(key, &format!("read failed: {}", e));
                None
            }
        }
    }

    /// Write a raw string value
    pub fn save_raw(&self, key: &str, value: &str) -> Result<()> {
        self.backend.set(key, value)
    }

    /// Delete a value
    pub fn remove(&self, key: &str) -> Result<()> {
        self.backend.remove(key)
    }

    fn warn_once(&self, key: &str, message: &str) {
        if lock(&self.warned).insert(key.to_string()) {
            warn!(key, backend = self.backend.id(), "{}", message);
        }
    }
}
