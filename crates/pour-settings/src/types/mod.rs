//! Settings types.

mod auth;
mod server;

pub use auth::{AuthSettings, DirectoryKind, DirectorySettings};
pub use server::{InternalApiSettings, ServerSettings};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PourSettings {
    /// Network and WebSocket settings.
    pub server: ServerSettings,
    /// Token verification settings.
    pub auth: AuthSettings,
    /// Where user records are looked up.
    pub directory: DirectorySettings,
    /// Internal HTTP API used by the REST backend.
    pub internal: InternalApiSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl PourSettings {
    /// Reject settings the gateway cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "auth.jwtSecret must be set (or POUR_JWT_SECRET)".into(),
            ));
        }
        if self.server.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalMs must be > 0".into(),
            ));
        }
        if self.server.heartbeat_timeout_ms < self.server.heartbeat_interval_ms {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatTimeoutMs must be >= server.heartbeatIntervalMs".into(),
            ));
        }
        if self.directory.kind == DirectoryKind::Http && self.directory.base_url.is_none() {
            return Err(SettingsError::InvalidValue(
                "directory.baseUrl is required when directory.kind is \"http\"".into(),
            ));
        }
        Ok(())
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive (e.g. `info` or `info,pour_server=debug`).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PourSettings {
        let mut s = PourSettings::default();
        s.auth.jwt_secret = "s3cret".into();
        s
    }

    #[test]
    fn defaults_fail_validation_without_secret() {
        let err = PourSettings::default().validate().unwrap_err();
        assert!(err.to_string().contains("jwtSecret"));
    }

    #[test]
    fn valid_settings_pass() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn timeout_shorter_than_interval_rejected() {
        let mut s = valid();
        s.server.heartbeat_interval_ms = 30_000;
        s.server.heartbeat_timeout_ms = 10_000;
        assert!(s.validate().is_err());
    }

    #[test]
    fn zero_heartbeat_interval_rejected() {
        let mut s = valid();
        s.server.heartbeat_interval_ms = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn http_directory_requires_base_url() {
        let mut s = valid();
        s.directory.kind = DirectoryKind::Http;
        assert!(s.validate().is_err());
        s.directory.base_url = Some("http://localhost:3000/api".into());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn camel_case_serialization() {
        let json = serde_json::to_value(valid()).unwrap();
        assert!(json["server"]["maxConnections"].is_number());
        assert_eq!(json["auth"]["jwtSecret"], "s3cret");
        assert_eq!(json["logging"]["level"], "info");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: PourSettings = serde_json::from_str(r#"{"server":{"port":9000}}"#).unwrap();
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.logging.level, "info");
    }
}
