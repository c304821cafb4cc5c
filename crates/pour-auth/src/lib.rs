//! # pour-auth
//!
//! Authentication gate for socket connections.
//!
//! A client sends its bearer token once after connecting. The gate:
//! 1. verifies signature and expiry through a [`TokenVerifier`]
//!    ([`JwtManager`], HS256 shared secret),
//! 2. resolves the user through a [`UserDirectory`]
//!    ([`StaticUserDirectory`] or [`HttpUserDirectory`]),
//! 3. rejects unknown or deactivated accounts,
//!
//! and yields an [`Identity`] the server uses to pick rooms.
//! Every failure is an [`AuthError`]; the gate never partially succeeds.

#![deny(unsafe_code)]

pub mod directory;
pub mod errors;
pub mod gate;
pub mod jwt;
pub mod user;

pub use directory::{HttpUserDirectory, StaticUserDirectory, UserDirectory};
pub use errors::AuthError;
pub use gate::AuthGate;
pub use jwt::{Claims, JwtManager, TokenVerifier};
pub use user::{Identity, UserRecord};
