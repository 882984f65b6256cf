//! Cache keys and the derived-view dependency graph
//!
//! A key names one queryable resource. Some resources are computed from
//! others on the server (statistics from a collection, a report from its
//! scores). Those edges are declared once, on the key type, and every
//! invalidation follows them.

use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;

/// Identity of a cached resource
pub trait CacheKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Keys whose server-side value is derived from this one
    fn derived(&self) -> Vec<Self> {
        Vec::new()
    }
}

/// Expand `roots` with every transitively derived key
///
/// Roots come first, in the order given, followed by derived keys in
/// breadth-first order. Each key appears once even when the declared
/// edges form a cycle.
#[must_use]
pub fn dependency_closure<K: CacheKey>(roots: &[K]) -> Vec<K> {
    let mut seen: HashSet<K> = HashSet::new();
    let mut order = Vec::new();
    let mut queue: VecDeque<K> = VecDeque::new();

    for root in roots {
        if seen.insert(root.clone()) {
            order.push(root.clone());
            queue.push_back(root.clone());
        }
    }

    while let Some(key) = queue.pop_front() {
        for next in key.derived() {
            if seen.insert(next.clone()) {
                order.push(next.clone());
                queue.push_back(next);
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Key {
        Fields(u32),
        Stats(u32),
        Summary,
        Loop,
    }

    impl CacheKey for Key {
        fn derived(&self) -> Vec<Self> {
            match self {
                Key::Fields(id) => vec![Key::Stats(*id)],
                Key::Stats(_) => vec![Key::Summary],
                Key::Summary => vec![],
                Key::Loop => vec![Key::Loop],
            }
        }
    }

    #[test]
    fn closure_follows_edges_transitively() {
        let keys = dependency_closure(&[Key::Fields(1)]);
        assert_eq!(keys, vec![Key::Fields(1), Key::Stats(1), Key::Summary]);
    }

    #[test]
    fn closure_deduplicates_shared_descendants() {
        let keys = dependency_closure(&[Key::Fields(1), Key::Fields(2)]);
        assert_eq!(
            keys,
            vec![Key::Fields(1), Key::Fields(2), Key::Stats(1), Key::Stats(2), Key::Summary]
        );
    }

    #[test]
    fn closure_terminates_on_cycles() {
        assert_eq!(dependency_closure(&[Key::Loop]), vec![Key::Loop]);
    }
}
