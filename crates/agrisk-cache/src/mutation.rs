//! Optimistic mutations
//!
//! A mutation claims its key, shows a local projection of the expected
//! result, sends the remote call, and settles:
//!
//! - success: the projection stays until the refetch replaces it
//! - failure: the entry is restored to exactly what it held before
//!
//! Either way the key and every declared dependent are invalidated so the
//! server value always wins in the end.

use crate::cache::{QueryCache, Snapshot};
use crate::error::MutationError;
use crate::key::CacheKey;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

type Projection<T, P> = Box<dyn FnOnce(&T, &P) -> T + Send>;

/// Describes how one mutation touches the cache
pub struct MutationPlan<K, T, P> {
    key: K,
    projection: Option<Projection<T, P>>,
    invalidates: Vec<K>,
}

impl<K: CacheKey, T, P> MutationPlan<K, T, P> {
    /// Mutation of the value cached under `key`
    #[inline]
    #[must_use]
    pub fn new(key: K) -> Self {
        Self {
            key,
            projection: None,
            invalidates: Vec::new(),
        }
    }

    /// Local projection shown until the server answers
    ///
    /// Applied only when a value of type `T` is already cached for the key.
    #[must_use]
    pub fn optimistic<F>(mut self, project: F) -> Self
    where
        F: FnOnce(&T, &P) -> T + Send + 'static,
    {
        self.projection = Some(Box::new(project));
        self
    }

    /// Extra keys to invalidate on settle, besides the mutated key
    #[must_use]
    pub fn invalidates(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.invalidates.extend(keys);
        self
    }

    /// Key being mutated
    #[inline]
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Whether a local projection is shown while the call is in flight
    #[inline]
    #[must_use]
    pub fn is_optimistic(&self) -> bool {
        self.projection.is_some()
    }

    /// Extra keys declared with [`MutationPlan::invalidates`]
    #[must_use]
    pub fn extra_invalidations(&self) -> &[K] {
        &self.invalidates
    }
}

impl<K: CacheKey, T, P> std::fmt::Debug for MutationPlan<K, T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationPlan")
            .field("key", &self.key)
            .field("optimistic", &self.projection.is_some())
            .field("invalidates", &self.invalidates)
            .finish()
    }
}

/// Restores the entry if the mutation future is dropped before it settles
struct PendingMutation<K: CacheKey> {
    cache: QueryCache<K>,
    key: K,
    ticket: u64,
    snapshot: Option<Snapshot>,
}

impl<K: CacheKey> PendingMutation<K> {
    fn commit(mut self) {
        self.snapshot = None;
        self.cache.commit(&self.key, self.ticket);
    }

    fn rollback(mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.cache.rollback(&self.key, self.ticket, snapshot);
        }
    }
}

impl<K: CacheKey> Drop for PendingMutation<K> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            tracing::debug!(key = ?self.key, "mutation abandoned before settling; rolling back");
            self.cache.rollback(&self.key, self.ticket, snapshot);
            self.cache.discard_if_unobserved(&self.key);
        }
    }
}

impl<K: CacheKey> QueryCache<K> {
    /// Run a mutation
    ///
    /// `send` performs the remote call. While it runs, fetch results for the
    /// key are ignored and a second mutation of the same key is refused with
    /// [`MutationError::InFlight`]. Invalidation refetches are awaited before
    /// this returns; their failures are logged, not returned.
    pub async fn mutate<T, P, R, E, F, Fut>(
        &self,
        plan: MutationPlan<K, T, P>,
        payload: P,
        send: F,
    ) -> Result<R, MutationError<E>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(P) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Display,
    {
        let MutationPlan {
            key,
            projection,
            invalidates,
        } = plan;

        let Some((ticket, before)) = self.begin_mutation(&key) else {
            tracing::warn!(?key, "mutation refused; another is in flight");
            return Err(MutationError::InFlight {
                key: format!("{key:?}"),
            });
        };

        if let Some(project) = projection {
            match before.visible().and_then(|v| v.downcast_ref::<T>()) {
                Some(current) => {
                    let next = project(current, &payload);
                    self.set_optimistic(&key, ticket, Arc::new(next));
                }
                None => tracing::debug!(?key, "nothing cached to project onto"),
            }
        }

        let pending = PendingMutation {
            cache: self.clone(),
            key: key.clone(),
            ticket,
            snapshot: Some(before),
        };

        tracing::debug!(?key, ticket, "mutation sent");
        let result = send(payload).await;

        let mut settle = Vec::with_capacity(invalidates.len() + 1);
        settle.push(key.clone());
        settle.extend(invalidates);

        let outcome = match result {
            Ok(reply) => {
                pending.commit();
                tracing::debug!(?key, ticket, "mutation confirmed");
                Ok(reply)
            }
            Err(e) => {
                pending.rollback();
                tracing::warn!(?key, ticket, error = %e, "mutation failed; rolled back");
                Err(MutationError::Failed(e))
            }
        };

        self.invalidate(&settle).await;
        self.discard_if_unobserved(&key);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Key {
        List,
        Total,
    }

    impl CacheKey for Key {
        fn derived(&self) -> Vec<Self> {
            match self {
                Key::List => vec![Key::Total],
                Key::Total => vec![],
            }
        }
    }

    type Server = Arc<Mutex<Vec<String>>>;

    fn list_fetcher(
        server: Server,
    ) -> impl Fn() -> futures::future::Ready<Result<Vec<String>, String>> + Send + Sync + 'static
    {
        move || futures::future::ready(Ok(server.lock().unwrap().clone()))
    }

    fn push_plan() -> MutationPlan<Key, Vec<String>, String> {
        MutationPlan::new(Key::List).optimistic(|list: &Vec<String>, item: &String| {
            let mut next = list.clone();
            next.push(item.clone());
            next
        })
    }

    async fn primed(server: &Server) -> (QueryCache<Key>, crate::QueryObserver<Key>) {
        let cache = QueryCache::new();
        let observer = cache.observe(Key::List);
        cache
            .fetch_query(Key::List, list_fetcher(server.clone()))
            .await
            .unwrap();
        (cache, observer)
    }

    #[tokio::test]
    async fn projection_visible_while_pending() {
        let server: Server = Arc::new(Mutex::new(vec!["a".to_string()]));
        let (cache, observer) = primed(&server).await;
        let (tx, rx) = oneshot::channel::<Result<(), String>>();

        let task = {
            let cache = cache.clone();
            let server = server.clone();
            tokio::spawn(async move {
                cache
                    .mutate(push_plan(), "b".to_string(), |item| async move {
                        let reply = rx.await.unwrap_or(Err("dropped".to_string()));
                        if reply.is_ok() {
                            server.lock().unwrap().push(item);
                        }
                        reply
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        assert_eq!(observer.data::<Vec<String>>().unwrap(), vec!["a", "b"]);
        assert!(observer.is_mutating());

        tx.send(Ok(())).unwrap();
        task.await.unwrap().unwrap();

        assert!(!observer.is_mutating());
        assert_eq!(observer.data::<Vec<String>>().unwrap(), vec!["a", "b"]);
        let snapshot = observer.snapshot().unwrap();
        assert!(snapshot.has_server_value);
        assert!(!snapshot.has_optimistic_value);
        assert!(!snapshot.stale);
    }

    #[tokio::test]
    async fn failure_restores_previous_value() {
        let server: Server = Arc::new(Mutex::new(vec!["a".to_string()]));
        let (cache, observer) = primed(&server).await;

        let err = cache
            .mutate(push_plan(), "b".to_string(), |_| async {
                Err::<(), _>("500".to_string())
            })
            .await
            .unwrap_err();

        assert_eq!(err.into_failure().as_deref(), Some("500"));
        assert_eq!(observer.data::<Vec<String>>().unwrap(), vec!["a"]);
        assert!(!observer.is_mutating());
    }

    #[tokio::test]
    async fn second_mutation_on_same_key_is_refused() {
        let server: Server = Arc::new(Mutex::new(vec![]));
        let (cache, observer) = primed(&server).await;
        let (tx, rx) = oneshot::channel::<()>();

        let first = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .mutate(push_plan(), "x".to_string(), |_| async move {
                        let _ = rx.await;
                        Ok::<_, String>(())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let second = cache
            .mutate(push_plan(), "y".to_string(), |_| async { Ok::<_, String>(()) })
            .await;
        assert!(second.unwrap_err().is_in_flight());
        assert_eq!(observer.data::<Vec<String>>().unwrap(), vec!["x"]);

        tx.send(()).unwrap();
        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn fetch_during_mutation_does_not_clobber_projection() {
        let server: Server = Arc::new(Mutex::new(vec!["a".to_string()]));
        let (cache, observer) = primed(&server).await;
        let (tx, rx) = oneshot::channel::<()>();

        let task = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .mutate(push_plan(), "b".to_string(), |_| async move {
                        let _ = rx.await;
                        Err::<(), _>("timeout".to_string())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        // a refetch racing with the mutation lands but is not applied
        assert!(!cache.refetch(&Key::List).await.unwrap());
        assert_eq!(observer.data::<Vec<String>>().unwrap(), vec!["a", "b"]);

        tx.send(()).unwrap();
        assert!(task.await.unwrap().is_err());
        assert_eq!(observer.data::<Vec<String>>().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn unobserved_failure_is_harmless() {
        let cache = QueryCache::<Key>::new();

        let result = cache
            .mutate(push_plan(), "b".to_string(), |_| async {
                Err::<(), _>("offline".to_string())
            })
            .await;

        assert!(result.is_err());
        assert!(!cache.contains(&Key::List));
        assert_eq!(cache.stats().entry_count, 0);
    }

    #[tokio::test]
    async fn dropped_mutation_rolls_back() {
        let server: Server = Arc::new(Mutex::new(vec!["a".to_string()]));
        let (cache, observer) = primed(&server).await;
        let (_tx, rx) = oneshot::channel::<()>();

        let task = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .mutate(push_plan(), "b".to_string(), |_| async move {
                        let _ = rx.await;
                        Ok::<_, String>(())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(observer.data::<Vec<String>>().unwrap(), vec!["a", "b"]);

        task.abort();
        let _ = task.await;

        assert_eq!(observer.data::<Vec<String>>().unwrap(), vec!["a"]);
        assert!(!observer.is_mutating());
    }

    #[tokio::test]
    async fn settle_invalidates_dependents() {
        let server: Server = Arc::new(Mutex::new(vec![]));
        let (cache, _list) = primed(&server).await;
        cache.set(Key::Total, 0usize);

        cache
            .mutate(push_plan(), "a".to_string(), |_| async { Ok::<_, String>(()) })
            .await
            .unwrap();

        // unobserved dependents are only marked; the next read refetches
        assert!(cache.snapshot(&Key::Total).unwrap().stale);
        assert_eq!(cache.get::<usize>(&Key::Total), Some(0));
    }
}
