//! Agrisk Cache - keyed query cache with optimistic mutations
//!
//! Reads go through [`QueryCache::fetch_query`], which remembers how to
//! refetch each key. Writes go through [`QueryCache::mutate`] with a
//! [`MutationPlan`] describing the local projection and the keys the server
//! recomputes. Entries are reference-counted by [`QueryObserver`] handles.
//!
//! # Example
//!
//! ```rust
//! use agrisk_cache::{CacheKey, MutationPlan, QueryCache};
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! enum Key {
//!     Notes,
//! }
//!
//! impl CacheKey for Key {}
//!
//! # futures::executor::block_on(async {
//! let cache = QueryCache::new();
//! let notes = cache.observe(Key::Notes);
//! cache.set(Key::Notes, vec!["first".to_string()]);
//!
//! let plan = MutationPlan::new(Key::Notes).optimistic(|notes: &Vec<String>, note: &String| {
//!     let mut next = notes.clone();
//!     next.push(note.clone());
//!     next
//! });
//! let result = cache
//!     .mutate(plan, "second".to_string(), |_| async { Err::<(), _>("offline") })
//!     .await;
//!
//! assert!(result.is_err());
//! assert_eq!(notes.data::<Vec<String>>(), Some(vec!["first".to_string()]));
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(unreachable_pub)]

mod cache;
mod entry;
mod error;
mod key;
mod mutation;
mod observer;

pub use cache::{CacheStats, InvalidationReport, QueryCache};
pub use entry::EntrySnapshot;
pub use error::{CacheError, MutationError};
pub use key::{dependency_closure, CacheKey};
pub use mutation::MutationPlan;
pub use observer::QueryObserver;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
