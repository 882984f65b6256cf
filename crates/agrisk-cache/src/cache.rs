//! Keyed query cache
//!
//! Holds one entry per [`CacheKey`]. Each entry exposes exactly one visible
//! value: the optimistic projection while a mutation is pending or settling,
//! otherwise the last server-confirmed value.
//!
//! Entries live while at least one [`QueryObserver`] references them. When
//! the last observer goes away the entry is discarded, or parked in a
//! time-bounded retention cache (moka) when a retention window is configured.

use crate::entry::{Entry, EntrySnapshot, Fetcher, Retained, Value};
use crate::error::CacheError;
use crate::key::{dependency_closure, CacheKey};
use crate::observer::QueryObserver;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use futures::future::join_all;
use futures::FutureExt;
use std::any::type_name;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of live entries
    pub entry_count: u64,
    /// Entries with at least one observer
    pub observed: u64,
    /// Entries with a mutation in flight
    pub pending_mutations: u64,
    /// Approximate number of parked entries awaiting revival
    pub retained: u64,
}

/// What an invalidation touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationReport<K> {
    /// Keys marked stale, roots first then derived keys
    pub invalidated: Vec<K>,
    /// Observed keys whose refetch landed
    pub refetched: Vec<K>,
    /// Observed keys whose refetch failed; their previous value is kept
    pub failed: Vec<K>,
}

impl<K> Default for InvalidationReport<K> {
    fn default() -> Self {
        Self {
            invalidated: Vec::new(),
            refetched: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Values captured when a mutation starts, restored verbatim on failure
#[derive(Clone, Default)]
pub(crate) struct Snapshot {
    pub(crate) server: Option<Value>,
    pub(crate) optimistic: Option<Value>,
}

impl Snapshot {
    pub(crate) fn visible(&self) -> Option<&Value> {
        self.optimistic.as_ref().or(self.server.as_ref())
    }
}

struct Inner<K: CacheKey> {
    entries: DashMap<K, Entry>,
    retained: Option<moka::sync::Cache<K, Retained>>,
    tickets: AtomicU64,
}

/// Shared query cache
///
/// Cloning is cheap; clones share the same entries.
pub struct QueryCache<K: CacheKey> {
    inner: Arc<Inner<K>>,
}

impl<K: CacheKey> Clone for QueryCache<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: CacheKey> std::fmt::Debug for QueryCache<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("stats", &self.stats())
            .finish()
    }
}

impl<K: CacheKey> Default for QueryCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: CacheKey> QueryCache<K> {
    /// Create cache that discards entries as soon as they are unobserved
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                retained: None,
                tickets: AtomicU64::new(0),
            }),
        }
    }

    /// Create cache that keeps unobserved server values for `window`
    ///
    /// A zero window behaves like [`QueryCache::new`].
    #[must_use]
    pub fn with_retention(window: Duration) -> Self {
        if window.is_zero() {
            return Self::new();
        }
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                retained: Some(
                    moka::sync::Cache::builder()
                        .time_to_live(window)
                        .build(),
                ),
                tickets: AtomicU64::new(0),
            }),
        }
    }

    /// Register interest in a key
    ///
    /// The entry is created (or revived from retention) if needed and lives
    /// until the returned observer and every other observer are dropped.
    pub fn observe(&self, key: K) -> QueryObserver<K> {
        self.ensure_entry(&key).observers += 1;
        tracing::trace!(?key, "observer attached");
        QueryObserver::new(self.clone(), key)
    }

    /// Visible value for a key, if cached and of type `T`
    #[must_use]
    pub fn get<T>(&self, key: &K) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.try_get(key).ok().flatten()
    }

    /// Visible value for a key, reporting a type mismatch instead of hiding it
    pub fn try_get<T>(&self, key: &K) -> Result<Option<T>, CacheError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let Some(entry) = self.inner.entries.get(key) else {
            return Ok(None);
        };
        match entry.visible() {
            None => Ok(None),
            Some(value) => value
                .downcast_ref::<T>()
                .cloned()
                .map(Some)
                .ok_or_else(|| CacheError::TypeMismatch {
                    key: format!("{key:?}"),
                    expected: type_name::<T>(),
                }),
        }
    }

    /// Store a server-confirmed value
    ///
    /// An optimistic projection of an in-flight mutation stays visible; the
    /// new value becomes the base that a rollback would not touch.
    pub fn set<T>(&self, key: K, value: T)
    where
        T: Send + Sync + 'static,
    {
        let mut entry = self.ensure_entry(&key);
        entry.generation += 1;
        entry.server = Some(Arc::new(value));
        if entry.pending.is_none() {
            entry.optimistic = None;
        }
        entry.stale = false;
        entry.confirmed_at = Some(Instant::now());
    }

    /// Read through the cache
    ///
    /// Returns the visible value when it is fresh; otherwise runs `fetch`,
    /// stores its result and returns it. The fetcher is remembered so that
    /// later invalidations can refetch the key without the caller.
    pub async fn fetch_query<T, E, F, Fut>(&self, key: K, fetch: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        E: Display + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let fetch = Arc::new(fetch);
        let fetcher: Fetcher = {
            let fetch = Arc::clone(&fetch);
            Arc::new(move || {
                let fut = (*fetch)();
                async move {
                    fut.await
                        .map(|v| Arc::new(v) as Value)
                        .map_err(|e| e.to_string())
                }
                .boxed()
            })
        };

        let cached = {
            let mut entry = self.ensure_entry(&key);
            entry.fetcher = Some(fetcher);
            if entry.stale {
                None
            } else {
                entry
                    .visible()
                    .and_then(|v| v.downcast_ref::<T>().cloned())
            }
        };
        if let Some(value) = cached {
            tracing::trace!(?key, "cache hit");
            return Ok(value);
        }

        let generation = self.begin_fetch(&key);
        tracing::debug!(?key, generation, "fetching");
        let value = match (*fetch)().await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(?key, error = %e, "fetch failed");
                return Err(e);
            }
        };

        if self.finish_fetch(&key, generation, Arc::new(value.clone())) {
            Ok(value)
        } else {
            Ok(self.get::<T>(&key).unwrap_or(value))
        }
    }

    /// Refetch a key with its registered fetcher
    pub async fn refetch(&self, key: &K) -> Result<bool, CacheError> {
        let fetcher = self
            .inner
            .entries
            .get(key)
            .and_then(|e| e.fetcher.clone())
            .ok_or_else(|| CacheError::NoFetcher {
                key: format!("{key:?}"),
            })?;
        self.run_fetcher(key, &fetcher).await
    }

    /// Ignore the result of any fetch currently in flight for `key`
    pub fn cancel_fetches(&self, key: &K) {
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            entry.generation += 1;
            tracing::trace!(?key, generation = entry.generation, "fetches cancelled");
        }
    }

    /// Drop the cached values of keys whose resource no longer exists
    ///
    /// In-flight fetches are cancelled and the entries are left empty and
    /// stale, so observers see nothing and the next read goes to the server.
    /// Observer counts and fetchers are kept. Returns the number of entries
    /// that held a value.
    pub fn forget(&self, keys: &[K]) -> usize {
        let mut cleared = 0;
        for key in keys {
            if let Some(retained) = &self.inner.retained {
                retained.invalidate(key);
            }
            let Some(mut entry) = self.inner.entries.get_mut(key) else {
                continue;
            };
            if entry.visible().is_some() {
                cleared += 1;
            }
            entry.generation += 1;
            entry.server = None;
            entry.optimistic = None;
            entry.stale = true;
            entry.confirmed_at = None;
        }
        tracing::debug!(keys = keys.len(), cleared, "forgot entries");
        cleared
    }

    /// Mark keys and every derived key stale, refetching the observed ones
    ///
    /// Refetches run concurrently and are awaited. Their failures are logged
    /// and reported, never returned as errors; the previous value stays.
    pub async fn invalidate(&self, keys: &[K]) -> InvalidationReport<K> {
        let mut report = InvalidationReport::default();
        let mut to_refetch: Vec<(K, Fetcher)> = Vec::new();

        for key in dependency_closure(keys) {
            if let Some(retained) = &self.inner.retained {
                retained.invalidate(&key);
            }
            let Some(mut entry) = self.inner.entries.get_mut(&key) else {
                continue;
            };
            entry.stale = true;
            entry.generation += 1;
            report.invalidated.push(key.clone());

            if entry.pending.is_some() {
                continue;
            }
            match entry.fetcher.clone() {
                Some(fetcher) if entry.observers > 0 => to_refetch.push((key.clone(), fetcher)),
                None if entry.optimistic.is_some() => {
                    // nothing can confirm the projection; force the next read to fetch
                    entry.optimistic = None;
                    entry.server = None;
                }
                _ => {}
            }
        }

        tracing::debug!(
            invalidated = report.invalidated.len(),
            refetching = to_refetch.len(),
            "invalidated"
        );

        let outcomes = join_all(to_refetch.iter().map(|(key, fetcher)| async move {
            (key.clone(), self.run_fetcher(key, fetcher).await)
        }))
        .await;

        for (key, outcome) in outcomes {
            match outcome {
                Ok(true) => report.refetched.push(key),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(?key, error = %e, "background refetch failed");
                    report.failed.push(key);
                }
            }
        }

        report
    }

    /// Whether a mutation is in flight for `key`
    ///
    /// Controls that would start another mutation for the key should be
    /// disabled while this is true.
    #[must_use]
    pub fn is_mutating(&self, key: &K) -> bool {
        self.inner
            .entries
            .get(key)
            .is_some_and(|e| e.pending.is_some())
    }

    /// Bookkeeping for a key
    #[must_use]
    pub fn snapshot(&self, key: &K) -> Option<EntrySnapshot> {
        self.inner.entries.get(key).map(|e| e.snapshot())
    }

    /// Whether a live entry exists for `key`
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Discard every unobserved entry without a pending mutation
    ///
    /// Returns the number of entries discarded.
    pub fn gc(&self) -> usize {
        let idle: Vec<K> = self
            .inner
            .entries
            .iter()
            .filter(|e| e.observers == 0 && e.pending.is_none())
            .map(|e| e.key().clone())
            .collect();
        idle.iter().filter(|k| self.discard_if_unobserved(k)).count()
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for entry in &self.inner.entries {
            stats.entry_count += 1;
            if entry.observers > 0 {
                stats.observed += 1;
            }
            if entry.pending.is_some() {
                stats.pending_mutations += 1;
            }
        }
        stats.retained = self
            .inner
            .retained
            .as_ref()
            .map_or(0, |r| r.entry_count());
        stats
    }

    // -- internals shared with observers and the mutation coordinator --

    fn ensure_entry(&self, key: &K) -> RefMut<'_, K, Entry> {
        self.inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| self.revive(key))
    }

    fn revive(&self, key: &K) -> Entry {
        match self.inner.retained.as_ref().and_then(|r| r.remove(key)) {
            Some(retained) => {
                tracing::debug!(?key, "revived from retention");
                retained.into_entry()
            }
            None => Entry::default(),
        }
    }

    fn begin_fetch(&self, key: &K) -> u64 {
        let mut entry = self.ensure_entry(key);
        entry.generation += 1;
        entry.generation
    }

    /// Apply a fetch result if nothing superseded it
    fn finish_fetch(&self, key: &K, generation: u64, value: Value) -> bool {
        let Some(mut entry) = self.inner.entries.get_mut(key) else {
            tracing::debug!(?key, "fetch landed after entry was discarded; ignored");
            return false;
        };
        if entry.generation != generation || entry.pending.is_some() {
            tracing::debug!(
                ?key,
                generation,
                current = entry.generation,
                pending = entry.pending.is_some(),
                "superseded fetch result ignored"
            );
            return false;
        }
        entry.server = Some(value);
        entry.optimistic = None;
        entry.stale = false;
        entry.confirmed_at = Some(Instant::now());
        true
    }

    async fn run_fetcher(&self, key: &K, fetcher: &Fetcher) -> Result<bool, CacheError> {
        let generation = self.begin_fetch(key);
        match fetcher().await {
            Ok(value) => Ok(self.finish_fetch(key, generation, value)),
            Err(message) => Err(CacheError::Fetch {
                key: format!("{key:?}"),
                message,
            }),
        }
    }

    pub(crate) fn release(&self, key: &K) {
        let remaining = match self.inner.entries.get_mut(key) {
            Some(mut entry) => {
                entry.observers = entry.observers.saturating_sub(1);
                entry.observers
            }
            None => return,
        };
        tracing::trace!(?key, remaining, "observer detached");
        if remaining == 0 {
            self.discard_if_unobserved(key);
        }
    }

    /// Remove an entry nobody observes and no mutation holds
    pub(crate) fn discard_if_unobserved(&self, key: &K) -> bool {
        let Some((key, entry)) = self
            .inner
            .entries
            .remove_if(key, |_, e| e.observers == 0 && e.pending.is_none())
        else {
            return false;
        };
        if let (Some(retained), Some(server)) = (&self.inner.retained, entry.server) {
            retained.insert(
                key.clone(),
                Retained {
                    server,
                    fetcher: entry.fetcher,
                },
            );
            tracing::trace!(?key, "entry parked in retention");
        } else {
            tracing::trace!(?key, "entry discarded");
        }
        true
    }

    /// Claim the key for a mutation, cancelling in-flight fetches
    ///
    /// Returns `None` when another mutation already holds the key.
    pub(crate) fn begin_mutation(&self, key: &K) -> Option<(u64, Snapshot)> {
        let mut entry = self.ensure_entry(key);
        if entry.pending.is_some() {
            return None;
        }
        let ticket = self.inner.tickets.fetch_add(1, Ordering::Relaxed) + 1;
        entry.pending = Some(ticket);
        entry.generation += 1;
        Some((
            ticket,
            Snapshot {
                server: entry.server.clone(),
                optimistic: entry.optimistic.clone(),
            },
        ))
    }

    pub(crate) fn set_optimistic(&self, key: &K, ticket: u64, value: Value) {
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            if entry.pending == Some(ticket) {
                entry.optimistic = Some(value);
            }
        }
    }

    pub(crate) fn commit(&self, key: &K, ticket: u64) {
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            if entry.pending == Some(ticket) {
                entry.pending = None;
                entry.stale = true;
            }
        }
    }

    pub(crate) fn rollback(&self, key: &K, ticket: u64, snapshot: Snapshot) {
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            if entry.pending == Some(ticket) {
                entry.server = snapshot.server;
                entry.optimistic = snapshot.optimistic;
                entry.pending = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Key {
        Items,
        Count,
    }

    impl CacheKey for Key {
        fn derived(&self) -> Vec<Self> {
            match self {
                Key::Items => vec![Key::Count],
                Key::Count => vec![],
            }
        }
    }

    /// Fetcher returning `base + n` where n counts calls
    fn counting_fetcher(
        base: u32,
        calls: Arc<AtomicUsize>,
    ) -> impl Fn() -> futures::future::Ready<Result<u32, String>> + Send + Sync + 'static {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(base + u32::try_from(n).unwrap_or(0)))
        }
    }

    #[tokio::test]
    async fn fetch_query_caches_fresh_values() {
        let cache = QueryCache::<Key>::new();
        let _observer = cache.observe(Key::Items);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .fetch_query(Key::Items, counting_fetcher(10, calls.clone()))
            .await
            .unwrap();
        let second = cache
            .fetch_query(Key::Items, counting_fetcher(10, calls.clone()))
            .await
            .unwrap();

        assert_eq!(first, 10);
        assert_eq!(second, 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_errors_leave_cache_untouched() {
        let cache = QueryCache::<Key>::new();
        let _observer = cache.observe(Key::Items);
        cache.set(Key::Items, 1u32);
        cache.invalidate(&[Key::Items]).await;

        let result = cache
            .fetch_query(Key::Items, || async { Err::<u32, _>("offline".to_string()) })
            .await;

        assert_eq!(result.unwrap_err(), "offline");
        assert_eq!(cache.get::<u32>(&Key::Items), Some(1));
    }

    #[tokio::test]
    async fn last_observer_discards_entry() {
        let cache = QueryCache::<Key>::new();
        let a = cache.observe(Key::Items);
        let b = cache.observe(Key::Items);
        cache.set(Key::Items, 5u32);

        drop(a);
        assert_eq!(cache.snapshot(&Key::Items).unwrap().observers, 1);
        drop(b);
        assert!(!cache.contains(&Key::Items));
    }

    #[tokio::test]
    async fn retention_revives_stale_value() {
        let cache = QueryCache::<Key>::with_retention(Duration::from_secs(60));
        {
            let _observer = cache.observe(Key::Items);
            cache.set(Key::Items, 7u32);
        }
        assert!(!cache.contains(&Key::Items));

        let observer = cache.observe(Key::Items);
        assert_eq!(observer.data::<u32>(), Some(7));
        assert!(cache.snapshot(&Key::Items).unwrap().stale);
    }

    #[tokio::test]
    async fn invalidation_refetches_observed_derived_keys() {
        let cache = QueryCache::<Key>::new();
        let _items = cache.observe(Key::Items);
        let _count = cache.observe(Key::Count);
        let item_calls = Arc::new(AtomicUsize::new(0));
        let count_calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch_query(Key::Items, counting_fetcher(100, item_calls.clone()))
            .await
            .unwrap();
        cache
            .fetch_query(Key::Count, counting_fetcher(0, count_calls.clone()))
            .await
            .unwrap();

        let report = cache.invalidate(&[Key::Items]).await;

        assert_eq!(report.invalidated, vec![Key::Items, Key::Count]);
        assert_eq!(report.refetched, vec![Key::Items, Key::Count]);
        assert_eq!(cache.get::<u32>(&Key::Items), Some(101));
        assert_eq!(cache.get::<u32>(&Key::Count), Some(1));
    }

    #[tokio::test]
    async fn unobserved_invalidation_marks_stale_without_fetching() {
        let cache = QueryCache::<Key>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .fetch_query(Key::Items, counting_fetcher(0, calls.clone()))
            .await
            .unwrap();

        let report = cache.invalidate(&[Key::Items]).await;

        assert!(report.refetched.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.snapshot(&Key::Items).unwrap().stale);
    }

    #[tokio::test]
    async fn cancelled_fetch_result_is_ignored() {
        let cache = QueryCache::<Key>::new();
        let _observer = cache.observe(Key::Items);
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();
        let rx = Arc::new(Slot::new(rx));

        let task = {
            let cache = cache.clone();
            let rx = rx.clone();
            tokio::spawn(async move {
                cache
                    .fetch_query(Key::Items, move || {
                        let rx = rx.take();
                        async move {
                            match rx {
                                Some(rx) => rx.await.map_err(|e| e.to_string()),
                                None => Err("second call".to_string()),
                            }
                        }
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        cache.cancel_fetches(&Key::Items);
        cache.set(Key::Items, 2u32);
        tx.send(1).unwrap();

        // the late result is returned to its caller but not stored
        assert_eq!(task.await.unwrap().unwrap(), 2);
        assert_eq!(cache.get::<u32>(&Key::Items), Some(2));
    }

    #[tokio::test]
    async fn forget_empties_observed_entries() {
        let cache = QueryCache::<Key>::with_retention(Duration::from_secs(60));
        let observer = cache.observe(Key::Items);
        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .fetch_query(Key::Items, counting_fetcher(10, calls.clone()))
            .await
            .unwrap();

        assert_eq!(cache.forget(&[Key::Items, Key::Count]), 1);

        assert_eq!(observer.data::<u32>(), None);
        let snapshot = cache.snapshot(&Key::Items).unwrap();
        assert!(snapshot.stale);
        assert!(!snapshot.has_server_value);
        assert_eq!(snapshot.observers, 1);

        // the next read goes back to the server
        let next = cache
            .fetch_query(Key::Items, counting_fetcher(10, calls.clone()))
            .await
            .unwrap();
        assert_eq!(next, 11);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // nothing is parked for revival
        drop(observer);
        cache.forget(&[Key::Items]);
        let revived = cache.observe(Key::Items);
        assert_eq!(revived.data::<u32>(), None);
    }

    #[tokio::test]
    async fn gc_sweeps_unobserved_entries() {
        let cache = QueryCache::<Key>::new();
        cache.set(Key::Items, 1u32);
        let _count = cache.observe(Key::Count);

        assert_eq!(cache.gc(), 1);
        assert!(!cache.contains(&Key::Items));
        assert!(cache.contains(&Key::Count));
    }

    #[tokio::test]
    async fn type_mismatch_is_reported() {
        let cache = QueryCache::<Key>::new();
        cache.set(Key::Items, 1u32);
        let err = cache.try_get::<String>(&Key::Items).unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch { .. }));
        assert_eq!(cache.get::<String>(&Key::Items), None);
    }

    #[test]
    fn stats_count_entries() {
        let cache = QueryCache::<Key>::new();
        let _observer = cache.observe(Key::Items);
        cache.set(Key::Count, 3u32);

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.observed, 1);
        assert_eq!(stats.pending_mutations, 0);
    }

    /// Single-use slot so a `Fn` fetcher can hand out a oneshot receiver once
    struct Slot<T>(std::sync::Mutex<Option<T>>);

    impl<T> Slot<T> {
        fn new(value: T) -> Self {
            Self(std::sync::Mutex::new(Some(value)))
        }

        fn take(&self) -> Option<T> {
            self.0.lock().unwrap().take()
        }
    }
}
