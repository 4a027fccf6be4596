//! Session persistence.
//!
//! Everything is stored through a small key-value contract. Store failures
//! are logged and swallowed: a failed write is a no-op and a failed or
//! corrupt read yields the caller's default.

use crate::session::TalePhase;
use crate::world::{Choice, SessionState};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::warn;

/// Key holding the whole session envelope.
pub const STATE_KEY: &str = "dds_state";

/// Key holding the configured Live DM endpoint.
pub const ENDPOINT_KEY: &str = "dm_endpoint";

/// Current save format version.
pub const SAVE_VERSION: u32 = 1;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Raw string storage by key.
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>, PersistError>;
    fn set_raw(&self, key: &str, value: &str) -> Result<(), PersistError>;
    fn delete(&self, key: &str) -> Result<(), PersistError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get_raw(&self, key: &str) -> Result<Option<String>, PersistError> {
        (**self).get_raw(key)
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), PersistError> {
        (**self).set_raw(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), PersistError> {
        (**self).delete(key)
    }
}

/// Best-effort typed access on top of [`KeyValueStore`].
pub trait StoreExt {
    /// The value under `key`, or `default` if it is missing or unreadable.
    fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T;

    /// Store `value` under `key`. Failures are logged.
    fn set<T: Serialize>(&self, key: &str, value: &T);

    /// Remove `key`. Failures are logged.
    fn remove(&self, key: &str);
}

impl<S: KeyValueStore + ?Sized> StoreExt for S {
    fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get_raw(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    warn!(key, error = %e, "Ignoring unreadable stored value");
                    default
                }
            },
            Ok(None) => default,
            Err(e) => {
                warn!(key, error = %e, "Store read failed");
                default
            }
        }
    }

    fn set<T: Serialize>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(PersistError::from)
            .and_then(|raw| self.set_raw(key, &raw));
        if let Err(e) = result {
            warn!(key, error = %e, "Store write failed");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.delete(key) {
            warn!(key, error = %e, "Store delete failed");
        }
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }
}

fn poisoned<T>(_: T) -> PersistError {
    PersistError::Unavailable("store lock poisoned".to_string())
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), PersistError> {
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), PersistError> {
        self.entries.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// A store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, PersistError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), PersistError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// A saved tale with everything needed to resume play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTale {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created (RFC 3339).
    pub saved_at: String,

    pub phase: TalePhase,

    /// The choices visible when the tale was saved.
    #[serde(default)]
    pub choices: Vec<Choice>,

    pub state: SessionState,
}

impl SavedTale {
    pub fn new(phase: TalePhase, choices: Vec<Choice>, state: SessionState) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            phase,
            choices,
            state,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, PersistError> {
        let saved: Self = serde_json::from_str(raw)?;
        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }
        Ok(saved)
    }

    /// Write this save under [`STATE_KEY`].
    pub fn store(&self, store: &dyn KeyValueStore) {
        store.set(STATE_KEY, self);
    }

    /// Read the save under [`STATE_KEY`].
    ///
    /// A missing, corrupt or out-of-date save reads as `None`.
    pub fn fetch(store: &dyn KeyValueStore) -> Option<Self> {
        let raw = match store.get_raw(STATE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Store read failed");
                return None;
            }
        };

        match Self::from_json(&raw) {
            Ok(saved) => Some(saved),
            Err(e) => {
                warn!(error = %e, "Ignoring unusable save");
                None
            }
        }
    }
}
