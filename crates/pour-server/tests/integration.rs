//! End-to-end tests over real sockets.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use pour_auth::{AuthGate, JwtManager, StaticUserDirectory, UserRecord};
use pour_core::{Role, UserId};
use pour_server::config::ServerConfig;
use pour_server::metrics::detached_handle;
use pour_server::server::GatewayServer;

const TIMEOUT: Duration = Duration::from_secs(5);
const SECRET: &str = "integration-secret";
const INTERNAL_KEY: &str = "internal-key";

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    server: Arc<GatewayServer>,
    ws_url: String,
    http_url: String,
    jwt: JwtManager,
    serve: tokio::task::JoinHandle<()>,
}

impl TestServer {
    fn token(&self, user: &str, role: Role) -> String {
        self.jwt.issue(&UserId::from(user), role, 300).unwrap()
    }

    async fn connect(&self) -> WsStream {
        let (ws, _) = connect_async(self.ws_url.as_str()).await.unwrap();
        ws
    }

    /// Connect, read the greeting, log in.
    async fn login(&self, user: &str, role: Role) -> WsStream {
        let mut ws = self.connect().await;
        assert_eq!(read_json(&mut ws).await["event"], "connection:established");
        send(&mut ws, "authenticate", json!({ "token": self.token(user, role) })).await;
        let reply = read_json(&mut ws).await;
        assert_eq!(reply["event"], "authenticated", "login failed: {reply}");
        ws
    }
}

async fn boot_with(config: ServerConfig) -> TestServer {
    let jwt = JwtManager::new(SECRET);
    let directory = StaticUserDirectory::from_records([
        UserRecord::new("s1", Role::Store),
        UserRecord::new("u1", Role::Customer),
        UserRecord::new("u2", Role::Customer),
        UserRecord::new("d1", Role::Delivery),
        UserRecord::new("a1", Role::Admin),
    ]);
    let gate = AuthGate::new(Arc::new(jwt.clone()), Arc::new(directory));
    let server = Arc::new(GatewayServer::new(config, gate, detached_handle()));
    let (addr, serve) = server.listen().await.unwrap();
    TestServer {
        server,
        ws_url: format!("ws://{addr}/ws"),
        http_url: format!("http://{addr}"),
        jwt,
        serve,
    }
}

async fn boot_server() -> TestServer {
    boot_with(ServerConfig {
        internal_api_key: Some(INTERNAL_KEY.into()),
        ..ServerConfig::default()
    })
    .await
}

async fn send(ws: &mut WsStream, event: &str, data: Value) {
    let frame = json!({ "event": event, "data": data }).to_string();
    ws.send(Message::Text(frame.into())).await.unwrap();
}

/// Next text frame as JSON, skipping control frames.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("read error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Assert nothing arrives within a short window.
async fn assert_silent(ws: &mut WsStream) {
    let got = timeout(Duration::from_millis(150), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return Some(text.to_string()),
                Some(Ok(_)) => {}
                _ => return None,
            }
        }
    })
    .await;
    if let Ok(Some(text)) = got {
        panic!("unexpected frame: {text}");
    }
}

async fn wait_until(mut check: impl AsyncFnMut() -> bool) {
    timeout(TIMEOUT, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition never held");
}

#[tokio::test]
async fn greeting_carries_connection_id() {
    let ts = boot_server().await;
    let mut ws = ts.connect().await;
    let hello = read_json(&mut ws).await;
    assert_eq!(hello["event"], "connection:established");
    assert!(hello["data"]["connectionId"].as_str().is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn authenticate_marks_user_online() {
    let ts = boot_server().await;
    let _ws = ts.login("u1", Role::Customer).await;
    assert!(ts.server.context().registry().is_online(&UserId::from("u1")));
    assert_eq!(ts.server.hub().online_count(), 1);
}

#[tokio::test]
async fn bare_string_token_accepted() {
    let ts = boot_server().await;
    let mut ws = ts.connect().await;
    let _ = read_json(&mut ws).await;
    send(&mut ws, "authenticate", json!(ts.token("a1", Role::Admin))).await;
    let reply = read_json(&mut ws).await;
    assert_eq!(reply["event"], "authenticated");
    assert_eq!(reply["data"], json!({ "userId": "a1", "role": "admin" }));
}

#[tokio::test]
async fn bad_token_gets_auth_error_and_socket_stays_open() {
    let ts = boot_server().await;
    let mut ws = ts.connect().await;
    let _ = read_json(&mut ws).await;

    send(&mut ws, "authenticate", json!({ "token": "not-a-jwt" })).await;
    assert_eq!(read_json(&mut ws).await["event"], "auth_error");
    assert_eq!(ts.server.hub().online_count(), 0);

    send(&mut ws, "authenticate", json!({ "token": ts.token("u1", Role::Customer) })).await;
    assert_eq!(read_json(&mut ws).await["event"], "authenticated");
}

#[tokio::test]
async fn events_before_auth_are_refused() {
    let ts = boot_server().await;
    let mut ws = ts.connect().await;
    let _ = read_json(&mut ws).await;
    send(&mut ws, "order:track", json!({ "orderId": "o1" })).await;
    let reply = read_json(&mut ws).await;
    assert_eq!(reply["event"], "error");
    assert_eq!(reply["data"]["message"], "not authenticated");
}

#[tokio::test]
async fn store_order_update_reaches_customer_and_admins() {
    let ts = boot_server().await;
    let mut store = ts.login("s1", Role::Store).await;
    let mut customer = ts.login("u1", Role::Customer).await;
    let mut other = ts.login("u2", Role::Customer).await;
    let mut admin = ts.login("a1", Role::Admin).await;

    send(
        &mut store,
        "order:update",
        json!({ "orderId": "o1", "status": "preparing", "userId": "u1" }),
    )
    .await;

    let got = read_json(&mut customer).await;
    assert_eq!(got["event"], "order:updated");
    assert_eq!(got["data"]["orderId"], "o1");
    assert_eq!(got["data"]["status"], "preparing");
    assert!(got["data"]["timestamp"].is_string());

    assert_eq!(read_json(&mut admin).await["event"], "order:updated");
    assert_silent(&mut other).await;
    assert_silent(&mut customer).await;
}

#[tokio::test]
async fn tracking_customer_sees_courier_updates() {
    let ts = boot_server().await;
    let mut courier = ts.login("d1", Role::Delivery).await;
    let mut customer = ts.login("u1", Role::Customer).await;

    send(&mut customer, "order:track", json!({ "orderId": "o9" })).await;
    assert_eq!(read_json(&mut customer).await["event"], "order:tracking");

    send(
        &mut courier,
        "location:update",
        json!({ "orderId": "o9", "latitude": 40.7, "longitude": -74.0 }),
    )
    .await;
    let got = read_json(&mut customer).await;
    assert_eq!(got["event"], "delivery:location");
    assert_eq!(got["data"]["orderId"], "o9");
    assert_eq!(got["data"]["courierId"], "d1");

    send(&mut customer, "order:untrack", json!({ "orderId": "o9" })).await;
    let _ = read_json(&mut customer).await;
}

#[tokio::test]
async fn disconnect_clears_presence() {
    let ts = boot_server().await;
    let mut ws = ts.login("u1", Role::Customer).await;
    ws.close(None).await.unwrap();

    let server = ts.server.clone();
    wait_until(async || !server.context().registry().is_online(&UserId::from("u1"))).await;
    let hub = ts.server.hub().clone();
    wait_until(async || hub.connection_count().await == 0).await;
}

#[tokio::test]
async fn newer_login_supersedes_older_connection() {
    let ts = boot_server().await;
    let mut first = ts.login("u1", Role::Customer).await;
    let mut second = ts.login("u1", Role::Customer).await;

    let registry = ts.server.context().registry().clone();
    let newest = registry.lookup(&UserId::from("u1")).unwrap();

    first.close(None).await.unwrap();
    let hub = ts.server.hub().clone();
    wait_until(async || hub.connection_count().await == 1).await;
    assert_eq!(registry.lookup(&UserId::from("u1")), Some(newest));

    let delivered = ts
        .server
        .hub()
        .emit_to_user(&UserId::from("u1"), &pour_core::WireMessage::new("ping:test", json!({})))
        .await;
    assert_eq!(delivered, 1);
    assert_eq!(read_json(&mut second).await["event"], "ping:test");
}

#[tokio::test]
async fn health_over_http() {
    let ts = boot_server().await;
    let _ws = ts.login("u1", Role::Customer).await;
    let body: Value = reqwest::get(format!("{}/health", ts.http_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 1);
    assert_eq!(body["onlineUsers"], 1);
}

#[tokio::test]
async fn upgrades_beyond_limit_get_503() {
    let ts = boot_with(ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    })
    .await;
    let mut first = ts.connect().await;
    let _ = read_json(&mut first).await;

    match connect_async(ts.ws_url.as_str()).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
            assert_eq!(resp.status().as_u16(), 503);
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("second connection should be refused"),
    }
}

#[tokio::test]
async fn concurrent_upgrades_respect_limit() {
    let ts = boot_with(ServerConfig {
        max_connections: 2,
        ..ServerConfig::default()
    })
    .await;

    let attempts = (0..10).map(|_| connect_async(ts.ws_url.as_str()));
    let results = futures::future::join_all(attempts).await;
    let mut accepted: Vec<WsStream> = results.into_iter().filter_map(Result::ok).map(|(ws, _)| ws).collect();
    assert_eq!(accepted.len(), 2);
    for ws in &mut accepted {
        assert_eq!(read_json(ws).await["event"], "connection:established");
    }
    assert_eq!(ts.server.hub().connection_count().await, 2);
}

#[tokio::test]
async fn shutdown_drains_sessions() {
    let ts = boot_server().await;
    let _customer = ts.login("u1", Role::Customer).await;
    let _store = ts.login("s1", Role::Store).await;
    assert_eq!(ts.server.hub().connection_count().await, 2);

    let TestServer { server, serve, .. } = ts;
    server
        .shutdown()
        .graceful_shutdown(vec![serve], Some(TIMEOUT))
        .await;

    assert_eq!(server.hub().connection_count().await, 0);
    assert_eq!(server.hub().online_count(), 0);
    assert_eq!(server.shutdown().live_sessions(), 0);
}

#[tokio::test]
async fn internal_emit_reaches_store_room() {
    let ts = boot_server().await;
    let mut store = ts.login("s1", Role::Store).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/emit", ts.http_url))
        .header("x-internal-key", INTERNAL_KEY)
        .json(&json!({ "target": { "store": "s1" }, "event": "order:new", "data": { "orderId": "o5" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["delivered"], 1);

    let got = read_json(&mut store).await;
    assert_eq!(got["event"], "order:new");
    assert_eq!(got["data"]["orderId"], "o5");

    let presence: Value = client
        .get(format!("{}/presence/s1", ts.http_url))
        .header("x-internal-key", INTERNAL_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(presence["online"], true);
}

#[tokio::test]
async fn silent_client_is_dropped() {
    let ts = boot_with(ServerConfig {
        heartbeat_interval: Duration::from_millis(50),
        heartbeat_timeout: Duration::from_millis(150),
        ..ServerConfig::default()
    })
    .await;
    // Never polled again, so server pings go unanswered.
    let _ws = ts.login("u1", Role::Customer).await;

    let registry = ts.server.context().registry().clone();
    wait_until(async || !registry.is_online(&UserId::from("u1"))).await;
}
