//! The authentication gate.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::directory::UserDirectory;
use crate::errors::AuthError;
use crate::jwt::TokenVerifier;
use crate::user::Identity;

/// Turns a client-supplied token into an [`Identity`], or fails closed.
#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<dyn TokenVerifier>,
    directory: Arc<dyn UserDirectory>,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate").finish_non_exhaustive()
    }
}

impl AuthGate {
    /// Create a gate from a verifier and a directory.
    pub fn new(verifier: Arc<dyn TokenVerifier>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            verifier,
            directory,
        }
    }

    /// Verify the token and resolve the active user it names.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }
        let claims = self.verifier.verify(token)?;
        let user_id = claims.subject().ok_or(AuthError::MissingSubject)?;

        let record = self
            .directory
            .find_user(&user_id)
            .await?
            .ok_or_else(|| AuthError::UnknownUser(user_id.clone()))?;

        if !record.is_active {
            return Err(AuthError::InactiveUser(user_id));
        }
        if let Some(hint) = claims.role_hint().filter(|h| *h != record.role) {
            warn!(%user_id, token_role = %hint, record_role = %record.role, "token role differs from user record");
        }

        debug!(%user_id, role = %record.role, "authenticated");
        Ok(record.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticUserDirectory;
    use crate::jwt::{Claims, JwtManager};
    use crate::user::UserRecord;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use pour_core::{Role, UserId};

    const SECRET: &str = "gate-secret";

    fn gate_with(records: Vec<UserRecord>) -> (AuthGate, JwtManager) {
        let jwt = JwtManager::new(SECRET);
        let dir = StaticUserDirectory::from_records(records);
        (AuthGate::new(Arc::new(jwt.clone()), Arc::new(dir)), jwt)
    }

    #[tokio::test]
    async fn active_user_passes() {
        let (gate, jwt) = gate_with(vec![UserRecord::new("s1", Role::Store).with_store("store-1")]);
        let token = jwt.issue(&UserId::from("s1"), Role::Store, 60).unwrap();
        let id = gate.authenticate(&token).await.unwrap();
        assert_eq!(id.user_id.as_str(), "s1");
        assert_eq!(id.role, Role::Store);
        assert_eq!(id.owned_store().as_str(), "store-1");
    }

    #[tokio::test]
    async fn record_role_wins_over_token_hint() {
        let (gate, jwt) = gate_with(vec![UserRecord::new("u1", Role::Customer)]);
        let token = jwt.issue(&UserId::from("u1"), Role::Admin, 60).unwrap();
        assert_eq!(gate.authenticate(&token).await.unwrap().role, Role::Customer);
    }

    #[tokio::test]
    async fn empty_token_rejected() {
        let (gate, _) = gate_with(vec![]);
        assert_matches!(gate.authenticate("").await, Err(AuthError::MissingToken));
    }

    #[tokio::test]
    async fn unknown_user_rejected() {
        let (gate, jwt) = gate_with(vec![]);
        let token = jwt.issue(&UserId::from("ghost"), Role::Customer, 60).unwrap();
        assert_matches!(gate.authenticate(&token).await, Err(AuthError::UnknownUser(u)) if u.as_str() == "ghost");
    }

    #[tokio::test]
    async fn inactive_user_rejected() {
        let (gate, jwt) = gate_with(vec![UserRecord::new("u1", Role::Customer).deactivated()]);
        let token = jwt.issue(&UserId::from("u1"), Role::Customer, 60).unwrap();
        assert_matches!(gate.authenticate(&token).await, Err(AuthError::InactiveUser(_)));
    }

    #[tokio::test]
    async fn token_without_subject_rejected() {
        let (gate, jwt) = gate_with(vec![]);
        let token = jwt
            .sign(&Claims {
                exp: chrono::Utc::now().timestamp() + 60,
                ..Claims::default()
            })
            .unwrap();
        assert_matches!(gate.authenticate(&token).await, Err(AuthError::MissingSubject));
    }

    struct FailingDirectory;

    #[async_trait]
    impl UserDirectory for FailingDirectory {
        async fn find_user(&self, _: &UserId) -> Result<Option<UserRecord>, AuthError> {
            Err(AuthError::Directory("unreachable".into()))
        }
    }

    #[tokio::test]
    async fn directory_failure_fails_closed() {
        let jwt = JwtManager::new(SECRET);
        let gate = AuthGate::new(Arc::new(jwt.clone()), Arc::new(FailingDirectory));
        let token = jwt.issue(&UserId::from("u1"), Role::Customer, 60).unwrap();
        assert_matches!(gate.authenticate(&token).await, Err(AuthError::Directory(_)));
    }
}
