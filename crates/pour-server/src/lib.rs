//! # pour-server
//!
//! Real-time gateway for the Pour delivery platform.
//!
//! Clients open a WebSocket on `/ws`, authenticate with a bearer token, and
//! are placed into rooms by role. Application events flow through a
//! per-role [`RoleTable`]; handlers return effects that the
//! [`BroadcastHub`] applies. Presence is tracked by the
//! [`ConnectionRegistry`], one connection per user with last login winning.
//!
//! HTTP routes: `/health`, `/metrics`, `/ws`, and an internal API
//! (`/presence/{userId}`, `/emit`) guarded by a shared key.

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod health;
pub mod internal;
pub mod metrics;
pub mod registry;
pub mod rooms;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use context::GatewayContext;
pub use errors::ServerError;
pub use events::{Effect, EventContext, EventError, RoleTable, Target};
pub use registry::ConnectionRegistry;
pub use rooms::Room;
pub use server::GatewayServer;
pub use shutdown::ShutdownCoordinator;
pub use websocket::broadcast::BroadcastHub;
pub use websocket::connection::ClientConnection;
