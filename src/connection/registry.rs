//! Registry of currently-open viewer connections.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, trace};

/// Tracks which real-time viewer connections are open.
///
/// Pure bookkeeping: the registry holds no transport state, only the set of
/// connection ids the broadcaster should fan out to. All operations are
/// idempotent so disconnect races can never fail: re-registering refreshes
/// the timestamp, unregistering an absent id is a no-op.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a viewer connection as open.
    pub fn register(&self, connection_id: impl Into<String>) {
        let connection_id = connection_id.into();
        trace!(%connection_id, "Registering viewer connection");
        let mut connections = self.connections.write().expect("registry lock poisoned");
        connections.insert(connection_id, Utc::now());
    }

    /// Record a viewer connection as closed. Unknown ids are a no-op.
    pub fn unregister(&self, connection_id: &str) {
        let mut connections = self.connections.write().expect("registry lock poisoned");
        if connections.remove(connection_id).is_some() {
            debug!(%connection_id, "Unregistered viewer connection");
        }
    }

    /// Ids of all currently-open connections, in no particular order.
    pub fn active(&self) -> Vec<String> {
        let connections = self.connections.read().expect("registry lock poisoned");
        connections.keys().cloned().collect()
    }

    /// When the given connection was (re-)registered.
    pub fn established_at(&self, connection_id: &str) -> Option<DateTime<Utc>> {
        let connections = self.connections.read().expect("registry lock poisoned");
        connections.get(connection_id).copied()
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        let connections = self.connections.read().expect("registry lock poisoned");
        connections.contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connections.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
