//! Account roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of account behind a connection. Decides which rooms the
/// connection joins after authentication and which events it may send.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A shopper placing and tracking orders.
    Customer,
    /// A store owner or store staff account.
    Store,
    /// A delivery courier.
    #[serde(alias = "courier", alias = "delivery_boy", alias = "deliveryBoy")]
    Delivery,
    /// A platform administrator.
    #[serde(alias = "superadmin")]
    Admin,
}

impl Role {
    /// All roles, in a stable order.
    pub const ALL: [Role; 4] = [Role::Customer, Role::Store, Role::Delivery, Role::Admin];

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Store => "store",
            Self::Delivery => "delivery",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" | "user" => Ok(Self::Customer),
            "store" | "store_owner" | "vendor" => Ok(Self::Store),
            "delivery" | "courier" | "delivery_boy" | "deliveryboy" => Ok(Self::Delivery),
            "admin" | "superadmin" => Ok(Self::Admin),
            _ => Err(ParseRoleError(s.to_owned())),
        }
    }
}
