//! Broadcast hub: owns live connections, room membership and the presence
//! registry, and fans messages out.
//!
//! Delivery is best-effort and at-most-once. Each recipient's frame goes
//! through [`ClientConnection::send`], which drops on a full queue.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use pour_auth::Identity;
use pour_core::{ConnectionId, OrderId, Role, StoreId, UserId, WireMessage};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::events::Target;
use crate::metrics::{BROADCAST_DROPS_TOTAL, BROADCAST_RECIPIENTS, PRESENCE_ONLINE_USERS};
use crate::registry::ConnectionRegistry;
use crate::rooms::{AdminFeed, Room, RoomTable};

/// Fan-out point for every outbound message.
pub struct BroadcastHub {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    rooms: Mutex<RoomTable>,
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastHub {
    /// Hub over an existing registry.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            rooms: Mutex::new(RoomTable::new()),
            registry,
        }
    }

    /// The presence registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Track a newly accepted socket.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Forget a socket: drop it from every room and release its presence
    /// entry if it still holds one.
    pub async fn remove(&self, connection_id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        let removed = self.connections.write().await.remove(connection_id);
        let left = self.rooms.lock().leave_all(connection_id);
        if let Some(user_id) = removed.as_ref().and_then(|c| c.user_id()) {
            if self.registry.release(&user_id, connection_id) {
                debug!(conn_id = %connection_id, %user_id, "presence released");
            }
        }
        self.record_presence();
        debug!(conn_id = %connection_id, rooms = left.len(), "connection removed");
        removed
    }

    /// Bind an authenticated identity to `connection`, register it as the
    /// user's current connection, and join `rooms`.
    ///
    /// Returns the connection this one superseded, if any.
    pub fn bind(
        &self,
        connection: &ClientConnection,
        identity: Identity,
        rooms: Vec<Room>,
    ) -> Option<ConnectionId> {
        let user_id = identity.user_id.clone();
        connection.bind_identity(identity);
        let previous = self
            .registry
            .register(user_id, connection.id.clone())
            .filter(|prev| *prev != connection.id);
        {
            let mut table = self.rooms.lock();
            for room in rooms {
                let _ = table.join(&connection.id, room);
            }
        }
        self.record_presence();
        previous
    }

    /// Add a connection to a room.
    pub fn join(&self, connection_id: &ConnectionId, room: Room) -> bool {
        self.rooms.lock().join(connection_id, room)
    }

    /// Remove a connection from a room.
    pub fn leave(&self, connection_id: &ConnectionId, room: &Room) -> bool {
        self.rooms.lock().leave(connection_id, room)
    }

    /// Rooms a connection is in.
    pub fn rooms_of(&self, connection_id: &ConnectionId) -> Vec<Room> {
        self.rooms.lock().rooms_of(connection_id)
    }

    /// Members of a room.
    pub fn room_members(&self, room: &Room) -> Vec<ConnectionId> {
        self.rooms.lock().members(room).cloned().collect()
    }

    /// Deliver `message` to `target`. Returns how many connections accepted it.
    pub async fn emit(&self, target: &Target, message: &WireMessage) -> usize {
        let json = match message.to_json() {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event = %message.event, error = %e, "failed to serialize event");
                return 0;
            }
        };

        let conns = self.connections.read().await;
        let recipients: Vec<&Arc<ClientConnection>> = match target {
            Target::All => conns.values().collect(),
            Target::To { users, rooms } => {
                let mut ids: HashSet<ConnectionId> = HashSet::new();
                {
                    let table = self.rooms.lock();
                    for room in rooms {
                        ids.extend(table.members(room).cloned());
                    }
                }
                ids.extend(users.iter().filter_map(|u| self.registry.lookup(u)));
                ids.iter().filter_map(|id| conns.get(id)).collect()
            }
        };

        let mut delivered = 0;
        for conn in &recipients {
            if conn.send(json.clone()) {
                delivered += 1;
            } else {
                counter!(BROADCAST_DROPS_TOTAL).increment(1);
                warn!(conn_id = %conn.id, event = %message.event, "failed to send event to client");
            }
        }
        #[allow(clippy::cast_precision_loss)]
        histogram!(BROADCAST_RECIPIENTS).record(recipients.len() as f64);
        debug!(event = %message.event, recipients = recipients.len(), delivered, "broadcast event");
        delivered
    }

    /// Send to one connection.
    pub async fn send_to(&self, connection_id: &ConnectionId, message: &WireMessage) -> bool {
        let conn = self.connections.read().await.get(connection_id).cloned();
        conn.is_some_and(|c| c.send_message(message))
    }

    /// Send to the connection currently registered for `user_id`. Silent
    /// no-op when the user is offline.
    pub async fn emit_to_user(&self, user_id: &UserId, message: &WireMessage) -> usize {
        self.emit(&Target::user(user_id.clone()), message).await
    }

    /// Send to a store's room.
    pub async fn emit_to_store(&self, store_id: &StoreId, message: &WireMessage) -> usize {
        self.emit(&Target::store(store_id.clone()), message).await
    }

    /// Send to every connection of a role.
    pub async fn emit_to_role(&self, role: Role, message: &WireMessage) -> usize {
        self.emit(&Target::role(role), message).await
    }

    /// Send to an order's tracking room.
    pub async fn emit_to_order(&self, order_id: &OrderId, message: &WireMessage) -> usize {
        self.emit(&Target::order(order_id.clone()), message).await
    }

    /// Send to a courier's dispatch room.
    pub async fn emit_to_courier(&self, courier_id: &UserId, message: &WireMessage) -> usize {
        self.emit(&Target::courier(courier_id.clone()), message).await
    }

    /// Send to one admin feed.
    pub async fn emit_to_admin(&self, feed: AdminFeed, message: &WireMessage) -> usize {
        self.emit(&Target::admin(feed), message).await
    }

    /// Send once to every member of any of `rooms`.
    pub async fn emit_to_rooms(&self, rooms: &[Room], message: &WireMessage) -> usize {
        self.emit(&Target::rooms(rooms.iter().cloned()), message).await
    }

    /// Send to every connected socket.
    pub async fn emit_to_all(&self, message: &WireMessage) -> usize {
        self.emit(&Target::All, message).await
    }

    /// Look up a live connection.
    pub async fn connection(&self, connection_id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().await.get(connection_id).cloned()
    }

    /// Number of live sockets, authenticated or not.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Number of users with a registered connection.
    pub fn online_count(&self) -> usize {
        self.registry.online_count()
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_presence(&self) {
        gauge!(PRESENCE_ONLINE_USERS).set(self.registry.online_count() as f64);
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(Arc::new(ConnectionRegistry::new()))
    }
}
