//! `GatewayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use pour_auth::AuthGate;
use pour_core::ConnectionId;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::context::GatewayContext;
use crate::errors::ServerError;
use crate::events::RoleTable;
use crate::health::{self, HealthResponse};
use crate::internal;
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastHub;
use crate::websocket::session::run_ws_session;

/// Shared state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Hub, role table and auth gate.
    pub ctx: Arc<GatewayContext>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
    /// One permit per socket allowed by `max_connections`.
    pub slots: Arc<Semaphore>,
}

/// The gateway server.
pub struct GatewayServer {
    config: Arc<ServerConfig>,
    ctx: Arc<GatewayContext>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: PrometheusHandle,
    slots: Arc<Semaphore>,
}

impl GatewayServer {
    /// Server with the standard role table.
    pub fn new(config: ServerConfig, gate: AuthGate, metrics: PrometheusHandle) -> Self {
        Self::with_context(config, GatewayContext::new(gate), metrics)
    }

    /// Server over a prepared context.
    pub fn with_context(config: ServerConfig, ctx: GatewayContext, metrics: PrometheusHandle) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_connections.min(Semaphore::MAX_PERMITS)));
        Self {
            config: Arc::new(config),
            ctx: Arc::new(ctx),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics,
            slots,
        }
    }

    /// Server with a custom role table.
    pub fn with_roles(
        config: ServerConfig,
        gate: AuthGate,
        roles: RoleTable,
        metrics: PrometheusHandle,
    ) -> Self {
        let ctx = GatewayContext::with_parts(gate, Arc::new(BroadcastHub::default()), Arc::new(roles));
        Self::with_context(config, ctx, metrics)
    }

    fn state(&self) -> AppState {
        AppState {
            ctx: self.ctx.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            slots: self.slots.clone(),
        }
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .route("/presence/{user_id}", get(internal::presence_handler))
            .route("/emit", post(internal::emit_handler))
            .with_state(self.state())
            .layer(cors_layer(&self.config.cors_origins))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in a background task until shutdown.
    ///
    /// Returns the bound address (useful with port 0) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let bind_err = |source| ServerError::Bind {
            addr: addr.clone(),
            source,
        };
        let listener = TcpListener::bind(&addr).await.map_err(bind_err)?;
        let local = listener.local_addr().map_err(bind_err)?;

        let app = self.router();
        let token = self.shutdown.token();
        info!(addr = %local, "gateway listening");
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server stopped with error");
            }
        });
        Ok((local, handle))
    }

    /// Hub, role table and auth gate.
    pub fn context(&self) -> &Arc<GatewayContext> {
        &self.ctx
    }

    /// The broadcast hub.
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.ctx.hub
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(parsed)
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.ctx.hub.connection_count().await;
    let online = state.ctx.hub.online_count();
    Json(health::health_check(state.start_time, connections, online))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Claim a connection slot, or the 503 to answer with.
///
/// The permit lives as long as the session, so concurrent upgrades cannot
/// overshoot `max_connections`.
fn reserve_slot(state: &AppState) -> Result<OwnedSemaphorePermit, Response> {
    if state.shutdown.is_shutting_down() {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response());
    }
    state.slots.clone().try_acquire_owned().map_err(|_| {
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        warn!(max = state.config.max_connections, "connection limit reached");
        (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response()
    })
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let slot = match reserve_slot(&state) {
        Ok(permit) => permit,
        Err(resp) => return resp,
    };

    let connection_id = ConnectionId::new();
    let token = state.shutdown.token();
    let tracked = state.shutdown.track_session();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            run_ws_session(socket, connection_id, state.ctx, state.config, token).await;
            drop(slot);
            drop(tracked);
        })
}
