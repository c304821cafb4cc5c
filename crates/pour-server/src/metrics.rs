//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Returns the handle that renders `/metrics`. Call once, before anything
/// records.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// A handle backed by a private recorder, for tests and embedding.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Sockets accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Sockets closed (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Live sockets (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Upgrades refused at capacity (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Socket lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Sockets closed for missing heartbeats (counter).
pub const WS_HEARTBEAT_TIMEOUTS_TOTAL: &str = "ws_heartbeat_timeouts_total";
/// Authentication attempts (counter, labels: outcome).
pub const AUTH_ATTEMPTS_TOTAL: &str = "auth_attempts_total";
/// Authentication failures (counter, labels: reason).
pub const AUTH_FAILURES_TOTAL: &str = "auth_failures_total";
/// Users with a registered connection (gauge).
pub const PRESENCE_ONLINE_USERS: &str = "presence_online_users";
/// Events accepted by a handler (counter, labels: event).
pub const EVENTS_RECEIVED_TOTAL: &str = "events_received_total";
/// Events rejected (counter, labels: event, error_type).
pub const EVENT_ERRORS_TOTAL: &str = "event_errors_total";
/// Recipients per emit (histogram).
pub const BROADCAST_RECIPIENTS: &str = "broadcast_recipients";
/// Frames dropped on full or closed queues (counter).
pub const BROADCAST_DROPS_TOTAL: &str = "broadcast_drops_total";
