//! Server network and internal API settings.

use serde::{Deserialize, Serialize};

/// Server network and WebSocket runtime settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP/WebSocket port (`0` auto-assigns).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Interval between server pings in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close a connection after this long without a pong.
    pub heartbeat_timeout_ms: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue length.
    pub outbound_buffer: usize,
    /// Allowed CORS origins for the HTTP endpoints (empty allows any).
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            max_connections: 10_000,
            heartbeat_interval_ms: 25_000,
            heartbeat_timeout_ms: 60_000,
            max_message_size: 64 * 1024,
            outbound_buffer: 256,
            cors_origins: Vec::new(),
        }
    }
}

/// Internal HTTP API used by the REST backend to push events.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InternalApiSettings {
    /// Shared key expected in `x-internal-key`. Unset disables the API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}
