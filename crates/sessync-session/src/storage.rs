//! Local persistence of the session record.
//!
//! The facade mirrors the user, session info and any tokens into a
//! [`LocalStore`] so a restarted process can show the last known identity
//! before its first check completes. The store is a plain key/value map of
//! JSON values; the key names are in [`keys`].

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use rand::Rng;
use serde_json::Value;

use crate::StorageError;

/// Key names used by the facade.
pub mod keys {
    pub const USER: &str = "user";
    pub const SESSION_INFO: &str = "sessionInfo";
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const SESSION_ID: &str = "sessionId";

    /// Everything a logout removes.
    pub const SESSION_KEYS: [&str; 5] = [USER, SESSION_INFO, ACCESS_TOKEN, REFRESH_TOKEN, SESSION_ID];
}

/// A synchronous key/value store for session data.
///
/// Implementations must be safe to call from any thread. Calls are short
/// and made without any session lock held.
pub trait LocalStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Removes every key, session-related or not.
    fn clear(&self) -> Result<(), StorageError>;

    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

impl<T: LocalStore> LocalStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<(), StorageError> {
        (**self).clear()
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        (**self).keys()
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// An in-process store. Nothing survives a restart; this is the default.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.map().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.map().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.map().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.map().clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.map().keys().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// A store backed by a single JSON object on disk.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash mid-write leaves the previous contents intact.
/// A missing file reads as empty.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, Value>, StorageError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Temp sibling unique to this write, so stores in other threads or
    /// processes sharing `path` never write the same temp file.
    fn temp_path(&self) -> PathBuf {
        let suffix: u64 = rand::rng().random();
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(format!(".{}.{suffix:016x}.tmp", std::process::id()));
        tmp.into()
    }

    fn save(&self, map: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(map)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, bytes)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Loads, applies `f`, saves. Serialized by the internal lock.
    fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, Value>),
    ) -> Result<(), StorageError> {
        let _held = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.load()?;
        f(&mut map);
        self.save(&map)
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let _held = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.update(|map| {
            map.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|map| {
            map.remove(key);
        })
    }

    /// Overwrites the file without reading it, so a corrupt file is
    /// cleared too.
    fn clear(&self) -> Result<(), StorageError> {
        let _held = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.save(&BTreeMap::new())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let _held = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.into_keys().collect())
    }
}
