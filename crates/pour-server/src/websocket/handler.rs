//! Inbound frame dispatch: authentication, then role-routed events.

use metrics::counter;
use pour_core::WireMessage;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::broadcast::BroadcastHub;
use super::connection::ClientConnection;
use crate::context::GatewayContext;
use crate::events::{Effect, EventContext};
use crate::metrics::{AUTH_ATTEMPTS_TOTAL, AUTH_FAILURES_TOTAL};

/// Client → server authentication event.
pub const AUTHENTICATE: &str = "authenticate";

/// Generic `error` frame.
pub fn error_message(message: &str, event: Option<&str>) -> WireMessage {
    let mut data = json!({ "message": message });
    if let Some(event) = event {
        data["event"] = json!(event);
    }
    WireMessage::new("error", data)
}

fn auth_error(message: &str) -> WireMessage {
    WireMessage::new("auth_error", json!({ "message": message }))
}

/// Accepts `{"token": "..."}` or a bare string.
fn token_from(data: &Value) -> &str {
    match data {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("token").and_then(Value::as_str).unwrap_or(""),
        _ => "",
    }
}

/// Handle one inbound text frame.
#[instrument(skip_all, fields(conn_id = %conn.id, event))]
pub async fn handle_message(text: &str, conn: &ClientConnection, ctx: &GatewayContext) {
    let msg: WireMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "invalid frame");
            let _ = conn.send_message(&error_message("invalid message format", None));
            return;
        }
    };
    let _ = tracing::Span::current().record("event", msg.event.as_str());

    if msg.event == AUTHENTICATE {
        authenticate(conn, &msg.data, ctx).await;
        return;
    }

    let Some(identity) = conn.identity() else {
        debug!("event before authentication");
        let _ = conn.send_message(&error_message("not authenticated", Some(&msg.event)));
        return;
    };

    let event_ctx = EventContext::new(identity);
    match ctx.roles.dispatch(&event_ctx, &msg.event, &msg.data) {
        Ok(effects) => apply_effects(conn, effects, &ctx.hub).await,
        Err(e) => {
            warn!(error = %e, "event rejected");
            let _ = conn.send_message(&error_message(&e.client_message(), Some(&msg.event)));
        }
    }
}

async fn authenticate(conn: &ClientConnection, data: &Value, ctx: &GatewayContext) {
    if conn.is_authenticated() {
        counter!(AUTH_ATTEMPTS_TOTAL, "outcome" => "duplicate").increment(1);
        let _ = conn.send_message(&auth_error("already authenticated"));
        return;
    }

    match ctx.gate.authenticate(token_from(data)).await {
        Ok(identity) => {
            counter!(AUTH_ATTEMPTS_TOTAL, "outcome" => "success").increment(1);
            let reply = WireMessage::new(
                "authenticated",
                json!({ "userId": identity.user_id, "role": identity.role }),
            );
            let user_id = identity.user_id.clone();
            let role = identity.role;
            let rooms = ctx.roles.rooms_for(&identity);
            let joined = rooms.len();
            if let Some(previous) = ctx.hub.bind(conn, identity, rooms) {
                info!(%user_id, superseded = %previous, "newer connection replaces registration");
            }
            info!(%user_id, %role, rooms = joined, "client authenticated");
            let _ = conn.send_message(&reply);
        }
        Err(e) => {
            counter!(AUTH_ATTEMPTS_TOTAL, "outcome" => "failure").increment(1);
            counter!(AUTH_FAILURES_TOTAL, "reason" => e.kind()).increment(1);
            warn!(error = %e, "authentication failed");
            let _ = conn.send_message(&auth_error(e.client_message()));
        }
    }
}

/// Carry out a handler's effects for the calling connection.
pub async fn apply_effects(conn: &ClientConnection, effects: Vec<Effect>, hub: &BroadcastHub) {
    for effect in effects {
        match effect {
            Effect::Join(room) => {
                debug!(room = %room, "join");
                let _ = hub.join(&conn.id, room);
            }
            Effect::Leave(room) => {
                debug!(room = %room, "leave");
                let _ = hub.leave(&conn.id, &room);
            }
            Effect::Reply(message) => {
                let _ = conn.send_message(&message);
            }
            Effect::Emit { target, message } => {
                let _ = hub.emit(&target, &message).await;
            }
        }
    }
}
