//! Role strategy table: rooms joined on authentication and events accepted,
//! per role.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use pour_auth::Identity;
use pour_core::Role;
use serde_json::Value;
use tracing::debug;

use super::handlers::{self, HandlerResult};
use super::{EventContext, EventError};
use crate::metrics::{EVENT_ERRORS_TOTAL, EVENTS_RECEIVED_TOTAL};
use crate::rooms::Room;

/// Anything that can turn an event payload into effects.
pub trait EventHandler: Send + Sync {
    /// Handle one event.
    fn handle(&self, ctx: &EventContext, data: &Value) -> HandlerResult;
}

impl<F> EventHandler for F
where
    F: Fn(&EventContext, &Value) -> HandlerResult + Send + Sync,
{
    fn handle(&self, ctx: &EventContext, data: &Value) -> HandlerResult {
        self(ctx, data)
    }
}

type RoomsFn = fn(&Identity) -> Vec<Room>;

/// What one role joins and what it may send.
pub struct RoleStrategy {
    rooms: RoomsFn,
    handlers: HashMap<&'static str, Arc<dyn EventHandler>>,
}

impl RoleStrategy {
    /// Strategy whose role-specific rooms come from `rooms`.
    pub fn new(rooms: RoomsFn) -> Self {
        Self {
            rooms,
            handlers: HashMap::new(),
        }
    }

    /// Accept `event` with `handler`.
    #[must_use]
    pub fn on(mut self, event: &'static str, handler: impl EventHandler + 'static) -> Self {
        let _ = self.handlers.insert(event, Arc::new(handler));
        self
    }

    /// Accepted event names, sorted.
    pub fn events(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Maps each role to its [`RoleStrategy`].
#[derive(Default)]
pub struct RoleTable {
    strategies: HashMap<Role, RoleStrategy>,
}

impl RoleTable {
    /// Empty table. Every role falls back to the base rooms and no events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace a role's strategy.
    pub fn insert(&mut self, role: Role, strategy: RoleStrategy) {
        let _ = self.strategies.insert(role, strategy);
    }

    /// The marketplace's roles and events.
    pub fn standard() -> Self {
        let mut table = Self::new();

        table.insert(
            Role::Store,
            RoleStrategy::new(|id| vec![Room::Store(id.owned_store())])
                .on("order:update", handlers::order_update)
                .on("store:status", handlers::store_status)
                .on("chat:message", handlers::chat_message),
        );
        table.insert(
            Role::Delivery,
            RoleStrategy::new(|id| vec![Room::Courier(id.user_id.clone())])
                .on("location:update", handlers::location_update)
                .on("delivery:status", handlers::delivery_status)
                .on("order:track", handlers::order_track)
                .on("order:untrack", handlers::order_untrack),
        );
        table.insert(
            Role::Admin,
            RoleStrategy::new(|_| vec![Room::AdminOrders, Room::AdminStores, Room::AdminUsers])
                .on("admin:notification", handlers::admin_notification)
                .on("order:track", handlers::order_track)
                .on("order:untrack", handlers::order_untrack),
        );
        table.insert(
            Role::Customer,
            RoleStrategy::new(|_| Vec::new())
                .on("order:track", handlers::order_track)
                .on("order:untrack", handlers::order_untrack)
                .on("chat:join", handlers::chat_join)
                .on("chat:leave", handlers::chat_leave)
                .on("chat:message", handlers::chat_message),
        );

        table
    }

    /// Rooms a freshly authenticated connection joins: its role room, its
    /// user room, then the role's own rooms.
    pub fn rooms_for(&self, identity: &Identity) -> Vec<Room> {
        let mut rooms = vec![Room::Role(identity.role), Room::User(identity.user_id.clone())];
        if let Some(strategy) = self.strategies.get(&identity.role) {
            rooms.extend((strategy.rooms)(identity));
        }
        rooms
    }

    /// Whether `role` may send `event`.
    pub fn handles(&self, role: Role, event: &str) -> bool {
        self.strategies
            .get(&role)
            .is_some_and(|s| s.handlers.contains_key(event))
    }

    /// Events `role` may send, sorted.
    pub fn events_for(&self, role: Role) -> Vec<&'static str> {
        self.strategies
            .get(&role)
            .map(RoleStrategy::events)
            .unwrap_or_default()
    }

    /// Route an event to the caller's role handler.
    pub fn dispatch(&self, ctx: &EventContext, event: &str, data: &Value) -> HandlerResult {
        let role = ctx.identity.role;
        let Some(handler) = self
            .strategies
            .get(&role)
            .and_then(|s| s.handlers.get(event))
        else {
            counter!(EVENT_ERRORS_TOTAL, "event" => event.to_owned(), "error_type" => "unsupported")
                .increment(1);
            return Err(EventError::Unsupported {
                event: event.to_owned(),
                role,
            });
        };

        counter!(EVENTS_RECEIVED_TOTAL, "event" => event.to_owned()).increment(1);
        let result = handler.handle(ctx, data);
        match &result {
            Ok(effects) => debug!(event, %role, effects = effects.len(), "event handled"),
            Err(e) => {
                counter!(EVENT_ERRORS_TOTAL, "event" => event.to_owned(), "error_type" => e.kind())
                    .increment(1);
            }
        }
        result
    }
}
