//! Registry of live pool members.
//!
//! Single source of truth for how many connections are up and how many of
//! them are ready.
//!
//! # Invariants
//!
//! - An id is live iff its connection is open and not yet closed.
//! - An id is pending while its handshake is in flight; it is never live
//!   and pending at once.
//! - Every ready id is also a live id; removing an id clears all three.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashSet;

use crate::identifiers::ConnectionId;

use super::connection::Connection;

// ============================================================================
// Registry
// ============================================================================

#[derive(Default)]
struct RegistryInner {
    /// Ordered so the highest id is always at hand for eviction.
    connections: BTreeMap<ConnectionId, Arc<Connection>>,
    /// Handshakes issued but not yet completed.
    pending: BTreeMap<ConnectionId, Arc<Connection>>,
    ready: FxHashSet<ConnectionId>,
}

/// Concurrent map of live connections plus their ready set.
///
/// Both structures sit behind one lock so readiness can never outlive
/// membership.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a connection whose handshake has been issued.
    pub fn put_pending(&self, connection: Arc<Connection>) {
        let id = connection.id();
        self.inner.write().pending.insert(id, connection);
    }

    /// Inserts a live connection under its own id, promoting it from
    /// pending if it was there.
    ///
    /// Returns the connection previously stored under that id, if any.
    pub fn put(&self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        let id = connection.id();
        let mut inner = self.inner.write();
        inner.pending.remove(&id);
        inner.connections.insert(id, connection)
    }

    /// Removes `id` from the live map, the pending map and the ready set.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let mut inner = self.inner.write();
        inner.ready.remove(&id);
        let pending = inner.pending.remove(&id);
        inner.connections.remove(&id).or(pending)
    }

    /// Records `id` as ready.
    ///
    /// Returns `false` (and records nothing) if `id` is not live.
    pub fn mark_ready(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.write();
        if inner.connections.contains_key(&id) {
            inner.ready.insert(id);
            true
        } else {
            false
        }
    }

    /// Returns the number of live connections.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.read().connections.len()
    }

    /// Returns the number of handshakes still in flight.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.read().pending.len()
    }

    /// Returns live plus pending connections.
    #[must_use]
    pub fn members(&self) -> usize {
        let inner = self.inner.read();
        inner.connections.len() + inner.pending.len()
    }

    /// Returns the number of ready connections.
    #[inline]
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.inner.read().ready.len()
    }

    /// Returns the largest live id.
    #[must_use]
    pub fn max_id(&self) -> Option<ConnectionId> {
        self.inner.read().connections.keys().next_back().copied()
    }

    /// Removes the member with the largest id, live or pending.
    ///
    /// Max lookup and removal happen under one write lock.
    pub fn evict_max(&self) -> Option<Arc<Connection>> {
        let mut inner = self.inner.write();
        let live = inner.connections.keys().next_back().copied();
        let pending = inner.pending.keys().next_back().copied();

        let (id, connection) = if pending > live {
            inner.pending.pop_last()?
        } else {
            inner.connections.pop_last()?
        };
        inner.ready.remove(&id);
        Some(connection)
    }

    /// Returns `true` if `id` is live.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner.read().connections.contains_key(&id)
    }

    /// Returns `true` if `id` is in the ready set.
    #[must_use]
    pub fn is_ready(&self, id: ConnectionId) -> bool {
        self.inner.read().ready.contains(&id)
    }

    /// Returns the live ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.inner.read().connections.keys().copied().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::testing::detached_connection;

    fn filled(ids: &[u64]) -> Registry {
        let registry = Registry::new();
        for &raw in ids {
            registry.put(detached_connection(ConnectionId::new(raw)));
        }
        registry
    }

    #[test]
    fn test_put_and_remove() {
        let registry = filled(&[1, 2, 3]);
        assert_eq!(registry.size(), 3);

        let removed = registry.remove(ConnectionId::new(2)).expect("present");
        assert_eq!(removed.id(), ConnectionId::new(2));
        assert_eq!(registry.size(), 2);
        assert!(registry.remove(ConnectionId::new(2)).is_none());
    }

    #[test]
    fn test_mark_ready_requires_membership() {
        let registry = filled(&[1]);
        assert!(registry.mark_ready(ConnectionId::new(1)));
        assert!(!registry.mark_ready(ConnectionId::new(5)));
        assert_eq!(registry.ready_count(), 1);
    }

    #[test]
    fn test_remove_clears_ready() {
        let registry = filled(&[1, 2]);
        registry.mark_ready(ConnectionId::new(2));

        registry.remove(ConnectionId::new(2));
        assert_eq!(registry.ready_count(), 0);
        assert!(!registry.is_ready(ConnectionId::new(2)));
    }

    #[test]
    fn test_max_id_and_evict() {
        let registry = filled(&[4, 9, 2]);
        assert_eq!(registry.max_id(), Some(ConnectionId::new(9)));

        let evicted = registry.evict_max().expect("non-empty");
        assert_eq!(evicted.id(), ConnectionId::new(9));
        assert_eq!(registry.max_id(), Some(ConnectionId::new(4)));
        assert_eq!(registry.ids(), vec![ConnectionId::new(2), ConnectionId::new(4)]);
    }

    #[test]
    fn test_empty_registry() {
        let registry = Registry::new();
        assert_eq!(registry.max_id(), None);
        assert!(registry.evict_max().is_none());
        assert_eq!(registry.size(), 0);
    }

    #[test]
    fn test_pending_counts_as_member() {
        let registry = filled(&[1]);
        registry.put_pending(detached_connection(ConnectionId::new(2)));

        assert_eq!(registry.size(), 1);
        assert_eq!(registry.pending(), 1);
        assert_eq!(registry.members(), 2);
        assert!(!registry.mark_ready(ConnectionId::new(2)));

        registry.put(detached_connection(ConnectionId::new(2)));
        assert_eq!(registry.size(), 2);
        assert_eq!(registry.pending(), 0);
    }

    #[test]
    fn test_evict_max_prefers_highest_pending() {
        let registry = filled(&[1, 2]);
        registry.put_pending(detached_connection(ConnectionId::new(3)));

        assert_eq!(registry.evict_max().map(|c| c.id()), Some(ConnectionId::new(3)));
        assert_eq!(registry.evict_max().map(|c| c.id()), Some(ConnectionId::new(2)));
        assert_eq!(registry.members(), 1);
    }

    #[test]
    fn test_remove_clears_pending() {
        let registry = Registry::new();
        registry.put_pending(detached_connection(ConnectionId::new(4)));

        assert!(registry.remove(ConnectionId::new(4)).is_some());
        assert_eq!(registry.members(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Pending(u64),
        Put(u64),
        Ready(u64),
        Remove(u64),
        EvictMax,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u64..20).prop_map(Op::Pending),
            (1u64..20).prop_map(Op::Put),
            (1u64..20).prop_map(Op::Ready),
            (1u64..20).prop_map(Op::Remove),
            Just(Op::EvictMax),
        ]
    }

    proptest! {
        #[test]
        fn prop_ready_is_subset_of_live(ops in proptest::collection::vec(op(), 0..64)) {
            let registry = Registry::new();
            for op in ops {
                match op {
                    Op::Pending(raw) => {
                        if !registry.contains(ConnectionId::new(raw)) {
                            registry.put_pending(detached_connection(ConnectionId::new(raw)));
                        }
                    }
                    Op::Put(raw) => { registry.put(detached_connection(ConnectionId::new(raw))); }
                    Op::Ready(raw) => { registry.mark_ready(ConnectionId::new(raw)); }
                    Op::Remove(raw) => { registry.remove(ConnectionId::new(raw)); }
                    Op::EvictMax => { registry.evict_max(); }
                }

                prop_assert!(registry.ready_count() <= registry.size());
                prop_assert_eq!(registry.members(), registry.size() + registry.pending());
                for raw in 1u64..20 {
                    let id = ConnectionId::new(raw);
                    prop_assert!(!registry.is_ready(id) || registry.contains(id));
                }
                prop_assert_eq!(registry.max_id(), registry.ids().last().copied());
            }
        }
    }
}
