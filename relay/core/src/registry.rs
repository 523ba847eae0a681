//! Session Registry - Live Connection Tracking
//!
//! Process-wide mapping from connection identity to conversation
//! session. Entries are created on connect and destroyed on disconnect;
//! nothing here survives a process restart.
//!
//! # Thread Safety
//!
//! The registry map uses `Arc<RwLock<HashMap>>` so concurrent
//! connect/disconnect from different connection tasks is safe. Each
//! session behind a handle is mutated only by its own connection's
//! bridge and drain task, so the per-session mutex is uncontended in
//! practice; it exists so the handle can be shared with the drain task
//! soundly.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::session::Session;

/// Unique identifier for a client connection.
///
/// Assigned when the connection is accepted and stable for its
/// lifetime. An opaque key: holding an ID does not keep the session
/// alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new unique connection ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw numeric value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Shared handle to one connection's session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Registry of live sessions keyed by connection identity.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<ConnectionId, SessionHandle>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a fresh session for a new connection.
    ///
    /// Returns the assigned ID and a handle to the empty session.
    pub fn create(&self) -> (ConnectionId, SessionHandle) {
        let id = ConnectionId::new();
        let handle: SessionHandle = Arc::new(Mutex::new(Session::new()));
        self.inner.write().insert(id, handle.clone());
        tracing::info!(connection_id = %id, "session registered");
        (id, handle)
    }

    /// Look up the session for a connection.
    #[must_use]
    pub fn get(&self, id: &ConnectionId) -> Option<SessionHandle> {
        self.inner.read().get(id).cloned()
    }

    /// Remove a connection's session.
    ///
    /// Returns the handle if it was registered. A still-running
    /// generation worker may hold its own clone of the handle; the
    /// registry entry is gone either way.
    pub fn remove(&self, id: &ConnectionId) -> Option<SessionHandle> {
        let removed = self.inner.write().remove(id);
        if removed.is_some() {
            tracing::info!(connection_id = %id, "session removed");
        }
        removed
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert_eq!(format!("{a}"), format!("conn-{}", a.as_u64()));
    }

    #[test]
    fn test_create_get_remove() {
        let registry = SessionRegistry::new();
        let (id, handle) = registry.create();
        assert_eq!(registry.len(), 1);

        let looked_up = registry.get(&id).expect("session should exist");
        assert!(Arc::ptr_eq(&handle, &looked_up));

        assert!(registry.remove(&id).is_some());
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());

        // Removing twice is a no-op.
        assert!(registry.remove(&id).is_none());
    }

    #[test]
    fn test_concurrent_create_and_remove() {
        let registry = SessionRegistry::new();
        let mut handles = Vec::new();

        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    let (id, _) = registry.create();
                    registry.remove(&id);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(registry.is_empty());
    }

    #[test]
    fn test_sessions_are_isolated() {
        let registry = SessionRegistry::new();
        let (id_a, handle_a) = registry.create();
        let (_id_b, handle_b) = registry.create();

        handle_a.lock().push_user("only in A");
        assert_eq!(handle_a.lock().len(), 1);
        assert!(handle_b.lock().is_empty());

        registry.remove(&id_a);
        assert_eq!(registry.len(), 1);
    }
}
