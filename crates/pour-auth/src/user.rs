//! User records and resolved identities.

use pour_core::{Role, StoreId, UserId};
use serde::{Deserialize, Serialize};

/// A user as the REST backend stores it. Only the fields this layer
/// consults are modelled; anything else in the document is ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// User id.
    #[serde(alias = "_id")]
    pub id: UserId,
    /// Account role.
    pub role: Role,
    /// Deactivated accounts may not connect.
    #[serde(default = "default_active", alias = "active")]
    pub is_active: bool,
    /// Store owned by this account, when it differs from the user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<StoreId>,
}

fn default_active() -> bool {
    true
}

impl UserRecord {
    /// Active record with no explicit store.
    pub fn new(id: impl Into<UserId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            is_active: true,
            store_id: None,
        }
    }

    /// Set the owned store.
    #[must_use]
    pub fn with_store(mut self, store_id: impl Into<StoreId>) -> Self {
        self.store_id = Some(store_id.into());
        self
    }

    /// Mark the record deactivated.
    #[must_use]
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Who a connection is, once the gate has let it through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Authenticated user.
    pub user_id: UserId,
    /// Role from the user record.
    pub role: Role,
    /// Owned store, if the record names one.
    pub store_id: Option<StoreId>,
}

impl Identity {
    /// Store rooms and chat for this account are keyed by this id.
    /// Store owners without an explicit `storeId` own the store with their
    /// own id.
    pub fn owned_store(&self) -> StoreId {
        self.store_id
            .clone()
            .unwrap_or_else(|| StoreId::for_owner(&self.user_id))
    }
}

impl From<UserRecord> for Identity {
    fn from(record: UserRecord) -> Self {
        Self {
            user_id: record.id,
            role: record.role,
            store_id: record.store_id,
        }
    }
}
