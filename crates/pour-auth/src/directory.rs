//! User directory: resolves a user id to a [`UserRecord`].

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use pour_core::UserId;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::AuthError;
use crate::user::UserRecord;

/// Read-only lookup into wherever user accounts live.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `Ok(None)` when the user does not exist.
    async fn find_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, AuthError>;
}

/// In-memory directory.
#[derive(Debug, Default)]
pub struct StaticUserDirectory {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl StaticUserDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory seeded from records.
    pub fn from_records(records: impl IntoIterator<Item = UserRecord>) -> Self {
        let dir = Self::new();
        for rec in records {
            dir.insert(rec);
        }
        dir
    }

    /// Load a JSON array of records.
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<UserRecord> = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), count = records.len(), "loaded user directory");
        Ok(Self::from_records(records))
    }

    /// Insert or replace a record.
    pub fn insert(&self, record: UserRecord) {
        let _ = self.users.write().insert(record.id.clone(), record);
    }

    /// Remove a record.
    pub fn remove(&self, user_id: &UserId) -> Option<UserRecord> {
        self.users.write().remove(user_id)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn find_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.users.read().get(user_id).cloned())
    }
}

/// Directory backed by the REST backend: `GET {base_url}/users/{id}`.
#[derive(Debug, Clone)]
pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

/// The backend answers either with the bare record or wrapped in `user`.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserResponse {
    Wrapped { user: UserRecord },
    Bare(UserRecord),
}

impl HttpUserDirectory {
    /// Build a client with a request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .map_err(|e| AuthError::Directory(format!("invalid base url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AuthError::Directory(format!("base url cannot take a path: {base_url}")));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// `{base}/users/{id}` with the id escaped as a single path segment.
    fn user_url(&self, user_id: &UserId) -> Result<Url, AuthError> {
        let mut url = self.base_url.clone();
        let _ = url
            .path_segments_mut()
            .map_err(|()| AuthError::Directory(format!("base url cannot take a path: {}", self.base_url)))?
            .pop_if_empty()
            .push("users")
            .push(user_id.as_str());
        Ok(url)
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn find_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, AuthError> {
        let mut req = self.client.get(self.user_url(user_id)?);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%user_id, %status, "user lookup failed");
            return Err(AuthError::Directory(format!("HTTP {status}: {body}")));
        }
        let parsed: UserResponse = resp.json().await?;
        let record = match parsed {
            UserResponse::Wrapped { user } | UserResponse::Bare(user) => user,
        };
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pour_core::Role;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http_dir(server: &MockServer, key: Option<&str>) -> HttpUserDirectory {
        HttpUserDirectory::new(server.uri(), key.map(String::from), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn static_lookup() {
        let dir = StaticUserDirectory::from_records([
            UserRecord::new("u1", Role::Customer),
            UserRecord::new("s1", Role::Store),
        ]);
        assert_eq!(dir.len(), 2);
        let rec = dir.find_user(&UserId::from("s1")).await.unwrap().unwrap();
        assert_eq!(rec.role, Role::Store);
        assert!(dir.find_user(&UserId::from("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn static_insert_replaces() {
        let dir = StaticUserDirectory::new();
        dir.insert(UserRecord::new("u1", Role::Customer));
        dir.insert(UserRecord::new("u1", Role::Customer).deactivated());
        let rec = dir.find_user(&UserId::from("u1")).await.unwrap().unwrap();
        assert!(!rec.is_active);
        assert!(dir.remove(&UserId::from("u1")).is_some());
        assert!(dir.is_empty());
    }

    #[tokio::test]
    async fn static_from_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            r#"[{"id":"a1","role":"admin"},{"_id":"d1","role":"delivery","isActive":false}]"#,
        )
        .unwrap();
        let dir = StaticUserDirectory::from_file(tmp.path()).unwrap();
        let d1 = dir.find_user(&UserId::from("d1")).await.unwrap().unwrap();
        assert_eq!(d1.role, Role::Delivery);
        assert!(!d1.is_active);
    }

    #[test]
    fn static_from_missing_file_errors() {
        let result = StaticUserDirectory::from_file(Path::new("/nonexistent/users.json"));
        assert_matches!(result, Err(AuthError::Io(_)));
    }

    #[test]
    fn static_from_bad_json_errors() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "{not json").unwrap();
        assert_matches!(StaticUserDirectory::from_file(tmp.path()), Err(AuthError::Json(_)));
    }

    #[tokio::test]
    async fn http_bare_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_id": "u1", "role": "customer", "isActive": true, "name": "Ada"
            })))
            .mount(&server)
            .await;

        let rec = http_dir(&server, None)
            .find_user(&UserId::from("u1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.id.as_str(), "u1");
        assert_eq!(rec.role, Role::Customer);
    }

    #[tokio::test]
    async fn http_wrapped_record_with_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/s1"))
            .and(header("authorization", "Bearer internal-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {"id": "s1", "role": "store", "storeId": "store-77"}
            })))
            .mount(&server)
            .await;

        let rec = http_dir(&server, Some("internal-key"))
            .find_user(&UserId::from("s1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.store_id.unwrap().as_str(), "store-77");
    }

    #[tokio::test]
    async fn http_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let found = http_dir(&server, None).find_user(&UserId::from("ghost")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn http_server_error_is_directory_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
            .mount(&server)
            .await;

        let err = http_dir(&server, None)
            .find_user(&UserId::from("u1"))
            .await
            .unwrap_err();
        assert_matches!(err, AuthError::Directory(msg) if msg.contains("500"));
    }

    #[tokio::test]
    async fn http_malformed_body_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
            .mount(&server)
            .await;

        assert!(http_dir(&server, None).find_user(&UserId::from("u1")).await.is_err());
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let dir = HttpUserDirectory::new("http://api.local/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(
            dir.user_url(&UserId::from("u1")).unwrap().as_str(),
            "http://api.local/users/u1"
        );
        let dir = HttpUserDirectory::new("http://api.local/v1/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(
            dir.user_url(&UserId::from("u1")).unwrap().as_str(),
            "http://api.local/v1/users/u1"
        );
    }

    #[test]
    fn user_id_escaped_as_one_segment() {
        let dir = HttpUserDirectory::new("http://api.local", None, Duration::from_secs(1)).unwrap();
        let url = dir.user_url(&UserId::from("a/b?c#d")).unwrap();
        assert_eq!(url.path(), "/users/a%2Fb%3Fc%23d");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn unusable_base_url_rejected() {
        assert_matches!(
            HttpUserDirectory::new("not a url", None, Duration::from_secs(1)),
            Err(AuthError::Directory(_))
        );
        assert_matches!(
            HttpUserDirectory::new("mailto:ops@pour.test", None, Duration::from_secs(1)),
            Err(AuthError::Directory(_))
        );
    }

    #[tokio::test]
    async fn http_slash_in_id_stays_in_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/a%2Fb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "a/b", "role": "customer" })))
            .expect(1)
            .mount(&server)
            .await;

        let rec = http_dir(&server, None).find_user(&UserId::from("a/b")).await.unwrap();
        assert_eq!(rec.unwrap().id, UserId::from("a/b"));
    }
}
