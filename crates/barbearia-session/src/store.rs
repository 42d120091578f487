//! Token persistence.
//!
//! [`TokenStore`] is the single holder of the access and refresh tokens.
//! It sits on top of a pluggable [`Storage`] backend and degrades to a
//! no-op when no durable storage exists, so it never fails at the call site.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

/// Key holding the current access token.
pub const ACCESS_KEY: &str = "barbearia_token";

/// Key holding the current refresh token.
pub const REFRESH_KEY: &str = "barbearia_refresh_token";

/// Single-key layout from older releases. Read-only fallback for the access token.
pub const LEGACY_KEY: &str = "token";

// ============================================================================
// Storage Trait
// ============================================================================

/// Durable string key/value storage.
///
/// Implementations must not panic; failures are logged and swallowed.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value.
    fn set(&self, key: &str, value: &str);

    /// Remove a value.
    fn remove(&self, key: &str);
}

// ============================================================================
// MemoryStorage
// ============================================================================

/// Process-local storage, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

// ============================================================================
// FileStorage
// ============================================================================

/// JSON file storage. Entries are loaded once on open and written through
/// on every mutation.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) a storage file.
    ///
    /// An unreadable or corrupt file is treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt token file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read token file");
                BTreeMap::new()
            }
        };

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// Get the storage file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocking write on the caller's thread, including a refresh task on a
    /// runtime worker. The file holds two short tokens, and a later `get`
    /// must observe the write. The bytes go to a sibling temp file that is
    /// renamed over the target, so a crash mid-write keeps the old tokens.
    fn persist(&self, entries: &BTreeMap<String, String>) {
        if let Some(parent) = self.path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            tracing::warn!(path = %parent.display(), error = %e, "Failed to create token directory");
            return;
        }

        let json = match serde_json::to_string_pretty(entries) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize tokens");
                return;
            }
        };

        let staging = self.staging_path();
        if let Err(e) = std::fs::write(&staging, json) {
            tracing::warn!(path = %staging.display(), error = %e, "Failed to write token file");
            return;
        }
        if let Err(e) = std::fs::rename(&staging, &self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to replace token file");
            let _ = std::fs::remove_file(&staging);
        }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.persist(&entries);
        }
    }
}

// ============================================================================
// TokenStore
// ============================================================================

/// Holder for the session's access and refresh tokens.
///
/// Cheap to clone; clones share the same backend.
#[derive(Debug, Clone)]
pub struct TokenStore {
    backend: Option<Arc<dyn Storage>>,
}

impl TokenStore {
    /// Create a store over the given backend.
    pub fn new(backend: Arc<dyn Storage>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Create a store backed by process memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Create a store with no durable storage. Every operation is a no-op.
    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    /// Whether a storage backend is attached.
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn set_access(&self, token: &str) {
        if let Some(backend) = &self.backend {
            backend.set(ACCESS_KEY, token);
        }
    }

    /// Get the access token, falling back to the legacy key.
    pub fn get_access(&self) -> Option<String> {
        let backend = self.backend.as_ref()?;
        read(backend.as_ref(), ACCESS_KEY).or_else(|| read(backend.as_ref(), LEGACY_KEY))
    }

    pub fn set_refresh(&self, token: &str) {
        if let Some(backend) = &self.backend {
            backend.set(REFRESH_KEY, token);
        }
    }

    pub fn get_refresh(&self) -> Option<String> {
        let backend = self.backend.as_ref()?;
        read(backend.as_ref(), REFRESH_KEY)
    }

    /// Store a token pair. A missing refresh token leaves the stored one intact.
    pub fn set_tokens(&self, access: &str, refresh: Option<&str>) {
        self.set_access(access);
        if let Some(refresh) = refresh.filter(|r| !r.is_empty()) {
            self.set_refresh(refresh);
        }
    }

    /// Remove both current-scheme keys.
    pub fn clear(&self) {
        if let Some(backend) = &self.backend {
            backend.remove(ACCESS_KEY);
            backend.remove(REFRESH_KEY);
        }
    }

    /// Remove the current-scheme keys and the legacy key.
    pub fn clear_all(&self) {
        if let Some(backend) = &self.backend {
            backend.remove(LEGACY_KEY);
        }
        self.clear();
    }
}

fn read(backend: &dyn Storage, key: &str) -> Option<String> {
    backend.get(key).filter(|v| !v.is_empty())
}
