//! Rooms: named broadcast groups and the membership table.

use std::collections::{HashMap, HashSet};
use std::fmt;

use pour_core::{ConnectionId, OrderId, Role, StoreId, UserId};
use serde::Deserialize;

/// A broadcast group. The `Display` form is the room key used in logs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Room {
    /// Every connection of one role.
    Role(Role),
    /// Every connection authenticated as one user.
    User(UserId),
    /// Order notifications for one store.
    Store(StoreId),
    /// Dispatch targets for one courier.
    Courier(UserId),
    /// Live tracking of one order.
    Order(OrderId),
    /// Admin order feed.
    AdminOrders,
    /// Admin store feed.
    AdminStores,
    /// Admin user feed.
    AdminUsers,
    /// Customer ↔ store chat for one store.
    Chat(StoreId),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role(r) => write!(f, "role:{r}"),
            Self::User(id) => write!(f, "user:{id}"),
            Self::Store(id) => write!(f, "store:{id}"),
            Self::Courier(id) => write!(f, "courier:{id}"),
            Self::Order(id) => write!(f, "order:{id}"),
            Self::AdminOrders => f.write_str("admin:orders"),
            Self::AdminStores => f.write_str("admin:stores"),
            Self::AdminUsers => f.write_str("admin:users"),
            Self::Chat(id) => write!(f, "chat:{id}"),
        }
    }
}

/// The three admin feeds, as named on the internal API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminFeed {
    /// `admin:orders`
    Orders,
    /// `admin:stores`
    Stores,
    /// `admin:users`
    Users,
}

impl From<AdminFeed> for Room {
    fn from(feed: AdminFeed) -> Self {
        match feed {
            AdminFeed::Orders => Self::AdminOrders,
            AdminFeed::Stores => Self::AdminStores,
            AdminFeed::Users => Self::AdminUsers,
        }
    }
}

/// Two-way membership index. Empty rooms are dropped.
#[derive(Debug, Default)]
pub struct RoomTable {
    members: HashMap<Room, HashSet<ConnectionId>>,
    joined: HashMap<ConnectionId, HashSet<Room>>,
}

impl RoomTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn` to `room`. Returns `false` if it was already a member.
    pub fn join(&mut self, conn: &ConnectionId, room: Room) -> bool {
        let added = self
            .members
            .entry(room.clone())
            .or_default()
            .insert(conn.clone());
        if added {
            let _ = self.joined.entry(conn.clone()).or_default().insert(room);
        }
        added
    }

    /// Remove `conn` from `room`. Returns `false` if it was not a member.
    pub fn leave(&mut self, conn: &ConnectionId, room: &Room) -> bool {
        let Some(set) = self.members.get_mut(room) else {
            return false;
        };
        let removed = set.remove(conn);
        if set.is_empty() {
            let _ = self.members.remove(room);
        }
        if removed {
            if let Some(rooms) = self.joined.get_mut(conn) {
                let _ = rooms.remove(room);
                if rooms.is_empty() {
                    let _ = self.joined.remove(conn);
                }
            }
        }
        removed
    }

    /// Remove `conn` from every room. Returns the rooms it was in.
    pub fn leave_all(&mut self, conn: &ConnectionId) -> Vec<Room> {
        let rooms: Vec<Room> = self
            .joined
            .remove(conn)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for room in &rooms {
            if let Some(set) = self.members.get_mut(room) {
                let _ = set.remove(conn);
                if set.is_empty() {
                    let _ = self.members.remove(room);
                }
            }
        }
        rooms
    }

    /// Current members of `room`.
    pub fn members(&self, room: &Room) -> impl Iterator<Item = &ConnectionId> {
        self.members.get(room).into_iter().flatten()
    }

    /// Number of members in `room`.
    pub fn member_count(&self, room: &Room) -> usize {
        self.members.get(room).map_or(0, HashSet::len)
    }

    /// Whether `conn` is in `room`.
    pub fn is_member(&self, conn: &ConnectionId, room: &Room) -> bool {
        self.members.get(room).is_some_and(|s| s.contains(conn))
    }

    /// Rooms `conn` has joined.
    pub fn rooms_of(&self, conn: &ConnectionId) -> Vec<Room> {
        self.joined
            .get(conn)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.members.len()
    }
}
