//! Server configuration.

use std::time::Duration;

use pour_settings::PourSettings;

/// Runtime configuration for [`GatewayServer`](crate::server::GatewayServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Upgrades beyond this many live sockets are refused with 503.
    pub max_connections: usize,
    /// Interval between server pings.
    pub heartbeat_interval: Duration,
    /// Close a socket that has been silent this long.
    pub heartbeat_timeout: Duration,
    /// Max inbound frame size in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue depth.
    pub outbound_buffer: usize,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
    /// Key required on the internal HTTP API. `None` disables it.
    pub internal_api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 10_000,
            heartbeat_interval: Duration::from_secs(25),
            heartbeat_timeout: Duration::from_secs(60),
            max_message_size: 64 * 1024,
            outbound_buffer: 256,
            cors_origins: Vec::new(),
            internal_api_key: None,
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &PourSettings) -> Self {
        let s = &settings.server;
        Self {
            host: s.host.clone(),
            port: s.port,
            max_connections: s.max_connections,
            heartbeat_interval: Duration::from_millis(s.heartbeat_interval_ms),
            heartbeat_timeout: Duration::from_millis(s.heartbeat_timeout_ms),
            max_message_size: s.max_message_size,
            outbound_buffer: s.outbound_buffer.max(1),
            cors_origins: s.cors_origins.clone(),
            internal_api_key: settings
                .internal
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
        }
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
