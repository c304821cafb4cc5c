//! # pour-core
//!
//! Foundation types shared by every Pour crate.
//!
//! - Branded ID newtypes ([`UserId`], [`ConnectionId`], [`StoreId`], [`OrderId`])
//! - [`Role`] - the four account kinds that decide room membership
//! - [`WireMessage`] - the `{event, data}` JSON envelope used on the socket
//! - [`logging`] - `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod message;
pub mod role;

pub use ids::{ConnectionId, OrderId, StoreId, UserId};
pub use message::{WireMessage, now_timestamp};
pub use role::{ParseRoleError, Role};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _conn = ConnectionId::new();
        let _user = UserId::from("u1");
        let _role = Role::Customer;
        let _msg = WireMessage::new("ping", serde_json::Value::Null);
    }
}
