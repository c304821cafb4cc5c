//! Internal HTTP API used by the REST backend to query presence and push
//! events without holding a socket.
//!
//! Both routes require the `x-internal-key` header. When no key is
//! configured they answer 404, as if they did not exist.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use pour_core::{OrderId, Role, StoreId, UserId, WireMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::events::Target;
use crate::rooms::AdminFeed;
use crate::server::AppState;

/// Header carrying the shared key.
pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";

/// `GET /presence/{userId}` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceResponse {
    /// The user asked about.
    pub user_id: UserId,
    /// Whether a connection is registered for them here.
    pub online: bool,
}

/// Recipient selector for `POST /emit`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitTarget {
    /// One user's registered connection.
    User(UserId),
    /// A store's room.
    Store(StoreId),
    /// A role's room.
    Role(Role),
    /// An order's tracking room.
    Order(OrderId),
    /// A courier's dispatch room.
    Courier(UserId),
    /// An admin feed: `orders`, `stores` or `users`.
    Admin(AdminFeed),
    /// Every socket.
    All,
}

impl From<EmitTarget> for Target {
    fn from(t: EmitTarget) -> Self {
        match t {
            EmitTarget::User(id) => Target::user(id),
            EmitTarget::Store(id) => Target::store(id),
            EmitTarget::Role(role) => Target::role(role),
            EmitTarget::Order(id) => Target::order(id),
            EmitTarget::Courier(id) => Target::courier(id),
            EmitTarget::Admin(feed) => Target::admin(feed),
            EmitTarget::All => Target::All,
        }
    }
}

/// `POST /emit` body.
#[derive(Debug, Deserialize)]
pub struct EmitRequest {
    /// Recipients.
    pub target: EmitTarget,
    /// Event name.
    pub event: String,
    /// Payload.
    #[serde(default)]
    pub data: Value,
}

/// `POST /emit` response.
#[derive(Debug, Serialize)]
pub struct EmitResponse {
    /// Connections that accepted the message.
    pub delivered: usize,
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let Some(expected) = state.config.internal_api_key.as_deref() else {
        return Err(StatusCode::NOT_FOUND);
    };
    match headers.get(INTERNAL_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        Some(key) if key == expected => Ok(()),
        _ => {
            warn!("internal API call with missing or wrong key");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// GET /presence/{userId}
pub async fn presence_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PresenceResponse>, StatusCode> {
    authorize(&state, &headers)?;
    let user_id = UserId::from(user_id);
    let online = state.ctx.registry().is_online(&user_id);
    Ok(Json(PresenceResponse { user_id, online }))
}

/// POST /emit
pub async fn emit_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EmitRequest>,
) -> Result<Json<EmitResponse>, StatusCode> {
    authorize(&state, &headers)?;
    if req.event.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let message = WireMessage::new(req.event, req.data);
    let target = Target::from(req.target);
    let delivered = state.ctx.hub.emit(&target, &message).await;
    debug!(event = %message.event, delivered, "internal emit");
    Ok(Json(EmitResponse { delivered }))
}
