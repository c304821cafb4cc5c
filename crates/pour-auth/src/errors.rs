//! Auth error types.

use pour_core::UserId;

/// Errors that can occur while authenticating a connection.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token was supplied.
    #[error("missing token")]
    MissingToken,

    /// Signature, format or claim validation failed.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token's `exp` is in the past.
    #[error("token expired")]
    Expired,

    /// The token carries no user identifier.
    #[error("token has no user id claim")]
    MissingSubject,

    /// No user record exists for the token's subject.
    #[error("unknown user: {0}")]
    UnknownUser(UserId),

    /// The user exists but is deactivated.
    #[error("user is deactivated: {0}")]
    InactiveUser(UserId),

    /// The user directory could not be queried.
    #[error("user directory error: {0}")]
    Directory(String),

    /// Token signing failed.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// HTTP request to the directory failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthError {
    /// Message safe to send back to the client in `auth_error`.
    ///
    /// Directory and transport details stay in the server log.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::MissingToken => "Authentication token required",
            Self::Expired => "Authentication token expired",
            Self::InvalidToken(_) | Self::MissingSubject | Self::Signing(_) => {
                "Invalid authentication token"
            }
            Self::UnknownUser(_) => "User not found",
            Self::InactiveUser(_) => "User account is deactivated",
            Self::Directory(_) | Self::Http(_) | Self::Json(_) | Self::Io(_) => {
                "Authentication unavailable"
            }
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidToken(_) | Self::MissingSubject | Self::Signing(_) => "invalid_token",
            Self::Expired => "expired",
            Self::UnknownUser(_) => "unknown_user",
            Self::InactiveUser(_) => "inactive_user",
            Self::Directory(_) | Self::Http(_) | Self::Json(_) | Self::Io(_) => "directory",
        }
    }
}
