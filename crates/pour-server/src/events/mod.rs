//! Application event handling.
//!
//! Handlers are plain functions of `(context, payload)` that return a list
//! of [`Effect`]s. They never touch sockets; the session loop applies the
//! effects against the broadcast hub. Which handlers a connection may call,
//! and which rooms it joins, is decided per role by [`RoleTable`].

pub mod handlers;
pub mod table;

use pour_auth::Identity;
use pour_core::{OrderId, Role, StoreId, UserId, WireMessage, now_timestamp};

use crate::rooms::{AdminFeed, Room};

pub use table::{EventHandler, RoleStrategy, RoleTable};

/// Who an emitted message goes to.
///
/// `To` resolves users through the presence registry and rooms through the
/// room table, then delivers once per distinct connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Every connected socket.
    All,
    /// The union of the listed users and rooms.
    To {
        /// Users reached through their registered connection.
        users: Vec<UserId>,
        /// Rooms reached through current membership.
        rooms: Vec<Room>,
    },
}

impl Target {
    /// One user.
    pub fn user(user_id: UserId) -> Self {
        Self::To {
            users: vec![user_id],
            rooms: Vec::new(),
        }
    }

    /// One room.
    pub fn room(room: Room) -> Self {
        Self::rooms([room])
    }

    /// Several rooms.
    pub fn rooms(rooms: impl IntoIterator<Item = Room>) -> Self {
        Self::To {
            users: Vec::new(),
            rooms: rooms.into_iter().collect(),
        }
    }

    /// A store's room.
    pub fn store(store_id: StoreId) -> Self {
        Self::room(Room::Store(store_id))
    }

    /// A role's room.
    pub fn role(role: Role) -> Self {
        Self::room(Room::Role(role))
    }

    /// An order's tracking room.
    pub fn order(order_id: OrderId) -> Self {
        Self::room(Room::Order(order_id))
    }

    /// A courier's dispatch room.
    pub fn courier(courier_id: UserId) -> Self {
        Self::room(Room::Courier(courier_id))
    }

    /// One admin feed.
    pub fn admin(feed: AdminFeed) -> Self {
        Self::room(Room::from(feed))
    }

    /// Also deliver to `user_id`, if given. No-op on `All`.
    #[must_use]
    pub fn and_user(mut self, user_id: Option<UserId>) -> Self {
        if let (Self::To { users, .. }, Some(u)) = (&mut self, user_id) {
            users.push(u);
        }
        self
    }
}

/// One thing a handler wants done.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Add the calling connection to a room.
    Join(Room),
    /// Remove the calling connection from a room.
    Leave(Room),
    /// Send a message back to the calling connection only.
    Reply(WireMessage),
    /// Fan a message out.
    Emit {
        /// Recipients.
        target: Target,
        /// Message.
        message: WireMessage,
    },
}

/// Inputs a handler may read besides its payload.
#[derive(Clone, Debug)]
pub struct EventContext {
    /// The authenticated caller.
    pub identity: Identity,
    /// Timestamp stamped on every outbound payload.
    pub now: String,
}

impl EventContext {
    /// Context stamped with the current time.
    pub fn new(identity: Identity) -> Self {
        Self::at(identity, now_timestamp())
    }

    /// Context with a fixed timestamp.
    pub fn at(identity: Identity, now: impl Into<String>) -> Self {
        Self {
            identity,
            now: now.into(),
        }
    }
}

/// Why a handler rejected an event. The connection stays open either way.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// The caller's role has no handler for this event.
    #[error("unsupported event '{event}' for role {role}")]
    Unsupported {
        /// Event name.
        event: String,
        /// Caller role.
        role: Role,
    },

    /// The payload did not match the event's shape.
    #[error("invalid payload for '{event}': {reason}")]
    InvalidPayload {
        /// Event name.
        event: String,
        /// Parse or validation failure.
        reason: String,
    },

    /// A required field was absent or empty.
    #[error("missing field '{field}' for '{event}'")]
    MissingField {
        /// Event name.
        event: String,
        /// Field name.
        field: &'static str,
    },
}

impl EventError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unsupported { .. } => "unsupported",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::MissingField { .. } => "missing_field",
        }
    }

    /// Text sent back to the client in the `error` event.
    pub fn client_message(&self) -> String {
        match self {
            Self::Unsupported { .. } => "unsupported event".into(),
            other => other.to_string(),
        }
    }
}
