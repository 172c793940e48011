use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::relay::connection::{Connection, ConnectionId};
use crate::types::ConversationKey;

/// Live connections grouped by conversation key.
///
/// Every operation on one key runs under that key's shard lock, so
/// `register`, `unregister` and `snapshot` are linearizable per key.
/// Connection state changes happen inside the same lock, which is what keeps
/// a closed connection from being registered again. Buckets that become
/// empty are removed immediately. Once [`close_all`](Self::close_all) has
/// run, no connection is admitted again.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    buckets: DashMap<ConversationKey, HashMap<ConnectionId, Arc<Connection>>>,
    closing: AtomicBool,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an `Open` connection to the bucket of `key`.
    ///
    /// Connections that are not open, or whose own key differs from `key`,
    /// are ignored and `false` is returned. So is everything after
    /// [`close_all`](Self::close_all).
    pub fn register(&self, key: &ConversationKey, conn: Arc<Connection>) -> bool {
        if conn.key() != key {
            debug!(conn_id = conn.id(), key = %key, "register: key mismatch; ignored");
            return false;
        }
        let entry = self.buckets.entry(key.clone());
        // Checked under the entry lock: close_all sets the flag before it
        // visits any shard.
        if self.is_closing() {
            debug!(conn_id = conn.id(), key = %key, "register: registry closed; ignored");
            return false;
        }
        if !conn.is_open() {
            debug!(conn_id = conn.id(), key = %key, "register: connection not open; ignored");
            return false;
        }
        match entry {
            Entry::Occupied(mut bucket) => {
                bucket.get_mut().insert(conn.id(), conn);
            }
            Entry::Vacant(slot) => {
                slot.insert(HashMap::from([(conn.id(), conn)]));
            }
        }
        true
    }

    /// Close `conn` and drop it from the bucket of `key`.
    ///
    /// A no-op for connections or buckets that are already gone, and for a
    /// `key` that is not the connection's own. Returns whether the
    /// connection was present.
    pub fn unregister(&self, key: &ConversationKey, conn: &Connection) -> bool {
        if conn.key() != key {
            debug!(conn_id = conn.id(), key = %key, "unregister: key mismatch; ignored");
            return false;
        }
        match self.buckets.entry(key.clone()) {
            Entry::Occupied(mut bucket) => {
                conn.mark_closed();
                let removed = bucket.get_mut().remove(&conn.id()).is_some();
                if bucket.get().is_empty() {
                    bucket.remove();
                }
                removed
            }
            Entry::Vacant(_) => {
                conn.mark_closed();
                false
            }
        }
    }

    /// Point-in-time copy of the members of `key`.
    pub fn snapshot(&self, key: &ConversationKey) -> Vec<Arc<Connection>> {
        self.buckets
            .get(key)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &ConversationKey) -> bool {
        self.buckets.contains_key(key)
    }

    pub fn conversation_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn connection_count(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.value().len()).sum()
    }

    /// Whether [`close_all`](Self::close_all) has run.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Close every connection, empty the registry and refuse later
    /// registrations. Returns the number of connections closed.
    pub fn close_all(&self) -> usize {
        self.closing.store(true, Ordering::SeqCst);
        let mut closed = 0;
        self.buckets.retain(|_, bucket| {
            for conn in bucket.values() {
                if conn.mark_closed() {
                    closed += 1;
                }
            }
            false
        });
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(participant: &str, peer: &str) -> Arc<Connection> {
        let (conn, _rx) = Connection::pending(participant, peer, 4);
        assert!(conn.mark_open());
        conn
    }

    #[test]
    fn register_then_unregister_leaves_no_bucket() {
        let registry = ConnectionRegistry::new();
        let conn = open("u1", "u2");
        let key = conn.key().clone();

        assert!(registry.register(&key, Arc::clone(&conn)));
        assert!(registry.contains(&key));
        assert!(registry.unregister(&key, &conn));
        assert!(!registry.contains(&key));
        assert_eq!(registry.conversation_count(), 0);
    }

    #[test]
    fn unregister_twice_is_a_noop() {
        let registry = ConnectionRegistry::new();
        let conn = open("u1", "u2");
        let key = conn.key().clone();
        registry.register(&key, Arc::clone(&conn));

        assert!(registry.unregister(&key, &conn));
        assert!(!registry.unregister(&key, &conn));
        assert!(!registry.contains(&key));
    }

    #[test]
    fn bucket_survives_while_other_members_remain() {
        let registry = ConnectionRegistry::new();
        let a = open("u1", "u2");
        let b = open("u2", "u1");
        let key = a.key().clone();
        registry.register(&key, Arc::clone(&a));
        registry.register(&key, Arc::clone(&b));

        registry.unregister(&key, &a);
        let members = registry.snapshot(&key);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id(), b.id());
    }

    #[test]
    fn closed_or_pending_connections_are_rejected() {
        let registry = ConnectionRegistry::new();
        let (pending, _rx) = Connection::pending("u1", "u2", 1);
        let key = pending.key().clone();
        assert!(!registry.register(&key, Arc::clone(&pending)));

        let closed = open("u1", "u2");
        registry.unregister(&key, &closed);
        assert!(!registry.register(&key, closed));
        assert!(!registry.contains(&key));
    }

    #[test]
    fn connection_cannot_join_a_foreign_bucket() {
        let registry = ConnectionRegistry::new();
        let conn = open("u1", "u2");
        let other = ConversationKey::new("u1", "u3");
        assert!(!registry.register(&other, conn));
        assert!(!registry.contains(&other));
    }

    #[test]
    fn close_all_closes_and_empties() {
        let registry = ConnectionRegistry::new();
        let a = open("u1", "u2");
        let b = open("u3", "u4");
        registry.register(&a.key().clone(), Arc::clone(&a));
        registry.register(&b.key().clone(), Arc::clone(&b));
        assert_eq!(registry.connection_count(), 2);

        assert_eq!(registry.close_all(), 2);
        assert_eq!(registry.conversation_count(), 0);
        assert!(!a.is_open() && !b.is_open());
    }

    #[test]
    fn unregister_with_foreign_key_leaves_connection_alone() {
        let registry = ConnectionRegistry::new();
        let conn = open("u1", "u2");
        let key = conn.key().clone();
        registry.register(&key, Arc::clone(&conn));

        assert!(!registry.unregister(&ConversationKey::new("u1", "u3"), &conn));
        assert!(conn.is_open());
        assert_eq!(registry.snapshot(&key).len(), 1);

        assert!(registry.unregister(&key, &conn));
        assert_eq!(registry.conversation_count(), 0);
    }

    #[test]
    fn registry_refuses_connections_after_close_all() {
        let registry = ConnectionRegistry::new();
        registry.close_all();
        assert!(registry.is_closing());

        let conn = open("u1", "u2");
        assert!(!registry.register(&conn.key().clone(), conn));
        assert_eq!(registry.connection_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_churn_leaves_no_empty_buckets() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = Vec::new();
        for task in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                for round in 0..50 {
                    let peer = format!("peer{}", (task + round) % 4);
                    let conn = open("hub", &peer);
                    let key = conn.key().clone();
                    assert!(registry.register(&key, Arc::clone(&conn)));
                    assert!(registry.snapshot(&key).iter().any(|c| c.id() == conn.id()));
                    tokio::task::yield_now().await;
                    assert!(registry.unregister(&key, &conn));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(registry.conversation_count(), 0);
        assert_eq!(registry.connection_count(), 0);
    }
}
