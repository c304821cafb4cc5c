//! Token verification and user directory settings.

use serde::{Deserialize, Serialize};

/// JWT verification settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HS256 shared secret, same value the REST backend signs with.
    pub jwt_secret: String,
    /// Required `iss` claim, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Required `aud` claim, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Clock skew tolerated on `exp`/`nbf`, in seconds.
    pub leeway_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: None,
            audience: None,
            leeway_secs: 30,
        }
    }
}

/// Which user directory backs authentication.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryKind {
    /// In-memory records, optionally seeded from `usersFile`.
    #[default]
    Static,
    /// `GET {baseUrl}/users/{id}` against the REST backend.
    Http,
}

/// User directory settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectorySettings {
    /// Directory implementation.
    pub kind: DirectoryKind,
    /// JSON file with an array of user records (static directory).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users_file: Option<String>,
    /// REST backend base URL (HTTP directory).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Bearer key sent to the REST backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Lookup timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            kind: DirectoryKind::Static,
            users_file: None,
            base_url: None,
            api_key: None,
            timeout_ms: 5_000,
        }
    }
}
