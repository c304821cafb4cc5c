//! Socket session lifecycle, from upgrade to disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use pour_core::{ConnectionId, WireMessage};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::handler::handle_message;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::config::ServerConfig;
use crate::context::GatewayContext;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL, WS_HEARTBEAT_TIMEOUTS_TOTAL,
};

/// How long the writer gets to flush a close frame on the way out.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Greeting queued as soon as the socket is accepted.
pub fn established_message(connection_id: &ConnectionId) -> WireMessage {
    WireMessage::new("connection:established", json!({ "connectionId": connection_id }))
}

/// Run one socket until the client leaves, goes silent, or the server
/// shuts down.
///
/// 1. Registers the connection with the hub and queues the greeting
/// 2. Spawns a writer that drains the outbound queue and sends pings
/// 3. Spawns a heartbeat watcher that ends the session on silence
/// 4. Feeds inbound text frames to [`handle_message`]
/// 5. Removes the connection from the hub, its rooms and the registry
#[instrument(skip_all, fields(conn_id = %connection_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection_id: ConnectionId,
    ctx: Arc<GatewayContext>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.outbound_buffer);
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), send_tx));
    let session = shutdown.child_token();
    let started = Instant::now();

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    ctx.hub.add(connection.clone()).await;
    let _ = connection.send_message(&established_message(&connection_id));

    let writer_cancel = session.clone();
    let ping_every = config.heartbeat_interval;
    let writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + ping_every, ping_every);
        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let Some(text) = frame else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                () = writer_cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        writer_cancel.cancel();
    });

    let heartbeat = tokio::spawn({
        let conn = connection.clone();
        let cancel = session.clone();
        let (interval, timeout) = (config.heartbeat_interval, config.heartbeat_timeout);
        async move {
            if run_heartbeat(conn, interval, timeout, cancel.clone()).await
                == HeartbeatResult::TimedOut
            {
                warn!(?timeout, "client unresponsive, disconnecting");
                counter!(WS_HEARTBEAT_TIMEOUTS_TOTAL).increment(1);
                cancel.cancel();
            }
        }
    });

    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            () = session.cancelled() => break,
        };
        let msg = match frame {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(error = %e, "socket read failed");
                break;
            }
            None => break,
        };
        connection.mark_alive();

        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF-8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        handle_message(&text, &connection, &ctx).await;
    }

    session.cancel();
    let _ = ctx.hub.remove(&connection_id).await;
    heartbeat.abort();
    if tokio::time::timeout(WRITER_DRAIN, writer).await.is_err() {
        debug!("writer did not finish in time");
    }

    info!(
        user_id = connection.user_id().as_ref().map(ToString::to_string),
        dropped = connection.drop_count(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
}
