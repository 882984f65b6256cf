//! Per-key cache state

use futures::future::BoxFuture;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

/// Type-erased cached value
pub(crate) type Value = Arc<dyn Any + Send + Sync>;

/// Stored refetch closure; errors are rendered to text since background
/// refetch failures are only logged
pub(crate) type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

/// State held for one key
#[derive(Default)]
pub(crate) struct Entry {
    /// Last value confirmed by the server
    pub(crate) server: Option<Value>,
    /// Speculative projection shown while a mutation is pending or settling
    pub(crate) optimistic: Option<Value>,
    /// Ticket of the mutation currently in flight
    pub(crate) pending: Option<u64>,
    /// Bumped on every fetch start and every cancellation; a fetch result is
    /// applied only if the generation it started with is still current
    pub(crate) generation: u64,
    pub(crate) stale: bool,
    pub(crate) observers: usize,
    pub(crate) fetcher: Option<Fetcher>,
    pub(crate) confirmed_at: Option<Instant>,
}

impl Entry {
    /// The single value visible to readers
    pub(crate) fn visible(&self) -> Option<&Value> {
        self.optimistic.as_ref().or(self.server.as_ref())
    }

    pub(crate) fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            has_server_value: self.server.is_some(),
            has_optimistic_value: self.optimistic.is_some(),
            mutation_pending: self.pending.is_some(),
            stale: self.stale,
            observers: self.observers,
            confirmed_at: self.confirmed_at,
        }
    }
}

/// Read-only view of an entry's bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySnapshot {
    /// A server-confirmed value is held
    pub has_server_value: bool,
    /// An optimistic projection is being shown
    pub has_optimistic_value: bool,
    /// A mutation is in flight
    pub mutation_pending: bool,
    /// The next read must refetch
    pub stale: bool,
    /// Number of live observers
    pub observers: usize,
    /// When the server value was last confirmed
    pub confirmed_at: Option<Instant>,
}

/// Value kept for revival after the last observer went away
#[derive(Clone)]
pub(crate) struct Retained {
    pub(crate) server: Value,
    pub(crate) fetcher: Option<Fetcher>,
}

impl Retained {
    pub(crate) fn into_entry(self) -> Entry {
        Entry {
            server: Some(self.server),
            stale: true,
            fetcher: self.fetcher,
            ..Entry::default()
        }
    }
}
