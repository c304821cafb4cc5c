//! Shared dependencies for every socket session.

use std::sync::Arc;

use pour_auth::AuthGate;

use crate::events::RoleTable;
use crate::registry::ConnectionRegistry;
use crate::websocket::broadcast::BroadcastHub;

/// What a session needs to authenticate and route events.
#[derive(Clone)]
pub struct GatewayContext {
    /// Connections, rooms and presence.
    pub hub: Arc<BroadcastHub>,
    /// Per-role rooms and handlers.
    pub roles: Arc<RoleTable>,
    /// Token and user checks.
    pub gate: AuthGate,
}

impl GatewayContext {
    /// Context with a fresh hub and the standard role table.
    pub fn new(gate: AuthGate) -> Self {
        Self::with_parts(
            gate,
            Arc::new(BroadcastHub::default()),
            Arc::new(RoleTable::standard()),
        )
    }

    /// Context from explicit parts.
    pub fn with_parts(gate: AuthGate, hub: Arc<BroadcastHub>, roles: Arc<RoleTable>) -> Self {
        Self { hub, roles, gate }
    }

    /// The presence registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.hub.registry()
    }
}
