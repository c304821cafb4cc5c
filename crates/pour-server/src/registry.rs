//! Presence registry: which connection currently speaks for each user.

use std::collections::HashMap;

use parking_lot::RwLock;
use pour_core::{ConnectionId, UserId};

/// In-memory user → connection map, private to one process.
///
/// Registration is last-write-wins. A user with two open sockets is
/// represented by whichever authenticated most recently.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: RwLock<HashMap<UserId, ConnectionId>>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `user_id` at `connection_id`. Returns the connection it replaced.
    pub fn register(&self, user_id: UserId, connection_id: ConnectionId) -> Option<ConnectionId> {
        self.entries.write().insert(user_id, connection_id)
    }

    /// Drop the entry for `user_id` unconditionally.
    pub fn unregister(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.entries.write().remove(user_id)
    }

    /// Drop the entry only if it still points at `connection_id`.
    ///
    /// Returns `true` if an entry was removed. A disconnect from a
    /// superseded socket leaves the newer registration alone.
    pub fn release(&self, user_id: &UserId, connection_id: &ConnectionId) -> bool {
        let mut entries = self.entries.write();
        if entries.get(user_id) == Some(connection_id) {
            let _ = entries.remove(user_id);
            true
        } else {
            false
        }
    }

    /// Current connection for `user_id`.
    pub fn lookup(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.entries.read().get(user_id).cloned()
    }

    /// Whether `user_id` has a registered connection.
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.entries.read().contains_key(user_id)
    }

    /// Number of users online.
    pub fn online_count(&self) -> usize {
        self.entries.read().len()
    }
}
