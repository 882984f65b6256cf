//! Token persistence
//!
//! Two equivalent key-value stores back the session: a durable one that
//! survives restarts and a session-scoped one that does not. The "remember
//! me" choice picks which one is authoritative; the other never holds the
//! tokens at the same time.

use crate::error::{ApiError, Result};
use agrisk_model::TokenPair;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key of the bearer token
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Key of the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

const TOKEN_KEYS: [&str; 2] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY];

/// String key-value storage
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Write a value
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Delete a value; deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-lifetime store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}

/// JSON object on disk
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| ApiError::Storage(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(values)
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            self.write_all(&values)?;
        }
        Ok(())
    }
}

/// Session tokens split across a durable and a session store
#[derive(Clone)]
pub struct TokenStore {
    durable: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Combine two stores
    #[must_use]
    pub fn new(durable: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        Self { durable, session }
    }

    /// Both stores in memory
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Durable store in a JSON file, session store in memory
    #[must_use]
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::new(path)), Arc::new(MemoryStore::new()))
    }

    /// Save tokens in the store selected by `remember_me`, removing them from the other
    pub fn store(&self, tokens: &TokenPair, remember_me: bool) -> Result<()> {
        let (target, other) = if remember_me {
            (&self.durable, &self.session)
        } else {
            (&self.session, &self.durable)
        };
        for key in TOKEN_KEYS {
            other.remove(key)?;
        }
        target.set(ACCESS_TOKEN_KEY, &tokens.access_token)?;
        target.set(REFRESH_TOKEN_KEY, &tokens.refresh_token)?;
        tracing::debug!(remember_me, "tokens stored");
        Ok(())
    }

    /// Current bearer token
    pub fn access_token(&self) -> Result<Option<String>> {
        self.read(ACCESS_TOKEN_KEY)
    }

    /// Current refresh token
    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Whether the durable store is authoritative
    pub fn is_remembered(&self) -> Result<bool> {
        Ok(self.durable.get(ACCESS_TOKEN_KEY)?.is_some())
    }

    /// Record refreshed tokens in whichever store currently holds the session
    ///
    /// The refresh token is only replaced when the server rotated it.
    pub fn update(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        let target = if self.is_remembered()? {
            &self.durable
        } else {
            &self.session
        };
        target.set(ACCESS_TOKEN_KEY, access_token)?;
        if let Some(refresh) = refresh_token {
            target.set(REFRESH_TOKEN_KEY, refresh)?;
        }
        Ok(())
    }

    /// Remove the token keys from both stores
    ///
    /// Every removal is attempted; the first failure is returned.
    pub fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for store in [&self.durable, &self.session] {
            for key in TOKEN_KEYS {
                if let Err(e) = store.remove(key) {
                    tracing::warn!(key, error = %e, "failed to remove token");
                    first_error.get_or_insert(e);
                }
            }
        }
        tracing::debug!("token stores cleared");
        first_error.map_or(Ok(()), Err)
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        match self.durable.get(key)? {
            Some(value) => Ok(Some(value)),
            None => self.session.get(key),
        }
    }
}
