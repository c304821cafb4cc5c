//! Per-socket connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pour_auth::Identity;
use pour_core::{ConnectionId, UserId, WireMessage};
use tokio::sync::mpsc;
use tracing::warn;

/// One connected socket.
pub struct ClientConnection {
    /// Connection ID.
    pub id: ConnectionId,
    /// Set once the auth gate lets the socket through.
    identity: Mutex<Option<Identity>>,
    /// Queue drained by the socket's writer task.
    tx: mpsc::Sender<Arc<String>>,
    /// When the socket was accepted.
    pub connected_at: Instant,
    /// Set by any inbound frame, cleared by the heartbeat check.
    pub is_alive: AtomicBool,
    last_seen: Mutex<Instant>,
    /// Messages dropped because the queue was full or closed.
    pub dropped_messages: AtomicU64,
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("identity", &*self.identity.lock())
            .finish_non_exhaustive()
    }
}

impl ClientConnection {
    /// Wrap a writer queue.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            identity: Mutex::new(None),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Attach the authenticated identity.
    pub fn bind_identity(&self, identity: Identity) {
        *self.identity.lock() = Some(identity);
    }

    /// The authenticated identity, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.identity.lock().clone()
    }

    /// The authenticated user, if any.
    pub fn user_id(&self) -> Option<UserId> {
        self.identity.lock().as_ref().map(|i| i.user_id.clone())
    }

    /// Whether the socket has passed the auth gate.
    pub fn is_authenticated(&self) -> bool {
        self.identity.lock().is_some()
    }

    /// Queue a pre-serialized frame. Never blocks.
    ///
    /// Returns `false` and bumps the drop counter if the queue is full or
    /// the writer has gone away.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize and queue one message.
    pub fn send_message(&self, message: &WireMessage) -> bool {
        match message.to_json() {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(conn_id = %self.id, event = %message.event, error = %e, "failed to serialize message");
                false
            }
        }
    }

    /// Total dropped frames.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound activity.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last inbound frame.
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Read and clear the alive flag.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pour_core::Role;
    use serde_json::json;

    fn make_connection(cap: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(cap);
        (ClientConnection::new(ConnectionId::from("c1"), tx), rx)
    }

    fn identity() -> Identity {
        Identity {
            user_id: UserId::from("u1"),
            role: Role::Customer,
            store_id: None,
        }
    }

    #[test]
    fn starts_unauthenticated() {
        let (conn, _rx) = make_connection(4);
        assert!(!conn.is_authenticated());
        assert!(conn.user_id().is_none());
    }

    #[test]
    fn bind_identity_sets_user() {
        let (conn, _rx) = make_connection(4);
        conn.bind_identity(identity());
        assert!(conn.is_authenticated());
        assert_eq!(conn.user_id().unwrap().as_str(), "u1");
        assert_eq!(conn.identity().unwrap().role, Role::Customer);
    }

    #[tokio::test]
    async fn send_message_serializes_envelope() {
        let (conn, mut rx) = make_connection(4);
        assert!(conn.send_message(&WireMessage::new("order:updated", json!({"orderId": "o1"}))));
        let frame = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["event"], "order:updated");
        assert_eq!(parsed["data"]["orderId"], "o1");
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send(Arc::new("a".into())));
        assert!(!conn.send(Arc::new("b".into())));
        assert!(!conn.send(Arc::new("c".into())));
        assert_eq!(conn.drop_count(), 2);
    }

    #[test]
    fn closed_queue_drops() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert!(!conn.send(Arc::new("a".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn alive_flag_cycle() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
        assert!(conn.last_seen_elapsed() < Duration::from_secs(5));
    }
}
