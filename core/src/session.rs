//! Persisted login state: the bearer token and the cached user record.
//!
//! # Design
//! `Storage` mirrors a browser's key-value storage. `Session` is an explicit
//! handle over one `Storage`; there is no process-wide session, so two
//! clients built on two storages never see each other's credentials. Clones
//! of a `Session` share the same storage.
//!
//! Presence of a token says nothing about its validity. Only the server can
//! accept or reject it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::ApiError;
use crate::types::User;

/// Storage key holding the raw bearer token.
pub const TOKEN_KEY: &str = "access_token";
/// Storage key holding the JSON-encoded user record.
pub const USER_KEY: &str = "user";

/// Key-value storage for session state.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), ApiError>;
    fn remove_item(&self, key: &str) -> Result<(), ApiError>;
}

/// In-process storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), ApiError> {
        self.items().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), ApiError> {
        self.items().remove(key);
        Ok(())
    }
}

/// Storage persisted as a JSON object in a file, so a session outlives the
/// process that created it.
///
/// The file is re-read on every access; changes written by another process
/// are picked up on the next read. A missing or unreadable file reads as
/// empty.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring corrupt session file");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), ApiError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut items = self.load();
        apply(&mut items);
        let text = serde_json::to_string_pretty(&items)
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ApiError::Storage(e.to_string()))?;
        }
        fs::write(&self.path, text).map_err(|e| ApiError::Storage(e.to_string()))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.load().remove(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), ApiError> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), ApiError> {
        self.update(|items| {
            items.remove(key);
        })
    }
}

/// Handle over the persisted token and user record.
#[derive(Clone)]
pub struct Session {
    storage: Arc<dyn Storage>,
}

impl Session {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// A session backed by fresh in-memory storage.
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get_item(TOKEN_KEY)
    }

    pub fn set_token(&self, token: &str) -> Result<(), ApiError> {
        self.storage.set_item(TOKEN_KEY, token)
    }

    /// The cached user record, or `None` if absent or not decodable.
    pub fn user(&self) -> Option<User> {
        let raw = self.storage.get_item(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::debug!(error = %e, "cached user record is not decodable");
                None
            }
        }
    }

    /// Store a user record exactly as the server sent it.
    pub fn set_user(&self, user: &serde_json::Value) -> Result<(), ApiError> {
        let text =
            serde_json::to_string(user).map_err(|e| ApiError::Serialization(e.to_string()))?;
        self.storage.set_item(USER_KEY, &text)
    }

    /// Remove the token and the user record together.
    pub fn clear(&self) -> Result<(), ApiError> {
        let token = self.storage.remove_item(TOKEN_KEY);
        let user = self.storage.remove_item(USER_KEY);
        token.and(user)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("has_token", &self.token().is_some())
            .finish()
    }
}
