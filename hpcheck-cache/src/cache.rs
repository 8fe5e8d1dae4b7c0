use lazy_static::lazy_static;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
pub use string_cache::DefaultAtom as Atom;
use thiserror::Error;

const PROBE_KEY: &str = "__hpcheck_probe__";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("storage backend is unavailable")]
    Unavailable,

    #[error("invalid cache key {0:?}")]
    InvalidKey(String),

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("storage i/o failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Key-value store for serialized check progress.
///
/// Every store overwrites the blob under its key wholesale.
pub trait ProgressCache {
    fn load(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn store(&mut self, key: &str, blob: &str) -> Result<(), CacheError>;
    fn remove(&mut self, key: &str) -> Result<(), CacheError>;

    /// Writes and removes a probe entry; any failure means the backend
    /// cannot be used for this run.
    fn is_available(&mut self) -> bool {
        let ok = self.store(PROBE_KEY, PROBE_KEY).is_ok() && self.remove(PROBE_KEY).is_ok();
        if !ok {
            tracing::warn!("progress cache probe failed");
        }
        ok
    }
}

lazy_static! {
    static ref SESSION_STORAGE: RwLock<HashMap<Atom, String>> = RwLock::new(HashMap::new());
}

/// Process-wide store, shared by every handle; lives as long as the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStorage;

impl SessionStorage {
    /// Number of keys currently held
    pub fn len() -> usize {
        SESSION_STORAGE.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty() -> bool {
        Self::len() == 0
    }
}

impl ProgressCache for SessionStorage {
    fn load(&self, key: &str) -> Result<Option<String>, CacheError> {
        let map = SESSION_STORAGE.read().map_err(|_| CacheError::Poisoned)?;
        Ok(map.get(&Atom::from(key)).cloned())
    }

    fn store(&mut self, key: &str, blob: &str) -> Result<(), CacheError> {
        let mut map = SESSION_STORAGE.write().map_err(|_| CacheError::Poisoned)?;
        map.insert(Atom::from(key), blob.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), CacheError> {
        let mut map = SESSION_STORAGE.write().map_err(|_| CacheError::Poisoned)?;
        map.remove(&Atom::from(key));
        Ok(())
    }
}

/// Instance-local store. Clones share the same map, so a host can keep a
/// handle after giving one to the engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<Atom, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressCache for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, CacheError> {
        let map = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(map.get(&Atom::from(key)).cloned())
    }

    fn store(&mut self, key: &str, blob: &str) -> Result<(), CacheError> {
        let mut map = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        map.insert(Atom::from(key), blob.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), CacheError> {
        let mut map = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        map.remove(&Atom::from(key));
        Ok(())
    }
}
