//! JWT verification.
//!
//! The REST backend signs HS256 tokens with a shared secret. Different
//! panels put the user id under different claim names (`userId`, `id` or
//! `sub`), so all three are accepted.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use pour_core::{Role, UserId};
use serde::{Deserialize, Serialize};

use crate::errors::AuthError;

/// Verifies a token string and returns its claims.
pub trait TokenVerifier: Send + Sync {
    /// Check signature and expiry.
    fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Token claims.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id as written by the customer and store panels.
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// User id as written by the admin panel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Standard subject claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Role hint. The directory record is authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Expiration time (Unix seconds).
    pub exp: i64,
    /// Issued at (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience (string or array).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,
}

impl Claims {
    /// The user this token was issued to.
    pub fn subject(&self) -> Option<UserId> {
        [&self.user_id, &self.id, &self.sub]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .map(|s| UserId::from(s.as_str()))
    }

    /// Parsed role hint, if present and recognised.
    pub fn role_hint(&self) -> Option<Role> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }
}

/// HS256 token manager.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: Option<String>,
    audience: Option<String>,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    /// Create a manager for the given shared secret.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: None,
            audience: None,
        }
    }

    /// Require the `iss` claim to match.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        self.validation.set_issuer(&[&issuer]);
        self.issuer = Some(issuer);
        self
    }

    /// Require the `aud` claim to contain `audience`.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        let audience = audience.into();
        self.validation.set_audience(&[&audience]);
        self.validation.validate_aud = true;
        self.audience = Some(audience);
        self
    }

    /// Clock skew tolerated on `exp`.
    #[must_use]
    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.validation.leeway = secs;
        self
    }

    /// Sign arbitrary claims.
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Issue a token for a user, valid for `ttl_secs`.
    ///
    /// The gateway never hands tokens to clients; this exists for the
    /// `issue-token` CLI helper and for tests.
    pub fn issue(&self, user_id: &UserId, role: Role, ttl_secs: i64) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: Some(user_id.to_string()),
            role: Some(role.as_str().to_owned()),
            exp: now + ttl_secs,
            iat: Some(now),
            iss: self.issuer.clone(),
            aud: self.audience.clone().map(serde_json::Value::String),
            ..Claims::default()
        };
        self.sign(&claims)
    }
}

impl TokenVerifier for JwtManager {
    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let token = extract_bearer_token(token.trim());
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;
        Ok(data.claims)
    }
}

/// Strip an optional `Bearer ` prefix.
pub fn extract_bearer_token(value: &str) -> &str {
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim()
}
