//! Observer handles

use crate::cache::QueryCache;
use crate::entry::EntrySnapshot;
use crate::key::CacheKey;

/// Keeps one cache entry alive
///
/// Dropping the last observer of a key releases its entry.
#[must_use = "the entry is released as soon as the observer is dropped"]
pub struct QueryObserver<K: CacheKey> {
    cache: QueryCache<K>,
    key: K,
}

impl<K: CacheKey> QueryObserver<K> {
    pub(crate) fn new(cache: QueryCache<K>, key: K) -> Self {
        Self { cache, key }
    }

    /// Observed key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Current visible value
    #[must_use]
    pub fn data<T>(&self) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.cache.get(&self.key)
    }

    /// Whether a mutation for the key is in flight
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        self.cache.is_mutating(&self.key)
    }

    /// Entry bookkeeping
    #[must_use]
    pub fn snapshot(&self) -> Option<EntrySnapshot> {
        self.cache.snapshot(&self.key)
    }
}

impl<K: CacheKey> std::fmt::Debug for QueryObserver<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryObserver").field("key", &self.key).finish()
    }
}

impl<K: CacheKey> Drop for QueryObserver<K> {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}
