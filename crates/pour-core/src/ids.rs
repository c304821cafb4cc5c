//! Branded ID newtypes for type safety.
//!
//! User, store and order identifiers come from the document database and are
//! opaque strings. Connection IDs are minted here as UUID v7 (time-ordered).
//! Wrapping each in its own type keeps a store id from being passed where a
//! user id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Identifier of a user account (customer, store owner, courier or admin).
    UserId
}

branded_id! {
    /// Identifier of a store.
    StoreId
}

branded_id! {
    /// Identifier of an order.
    OrderId
}

branded_id! {
    /// Identifier of one WebSocket connection.
    ConnectionId
}

impl ConnectionId {
    /// Mint a fresh connection ID (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreId {
    /// Store owners whose account has no separate store record use their
    /// own user id as the store id.
    #[must_use]
    pub fn for_owner(user_id: &UserId) -> Self {
        Self(user_id.as_str().to_owned())
    }
}
