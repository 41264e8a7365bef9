//! Shared helpers for integration tests: a server on an ephemeral port and
//! small WebSocket/HTTP conveniences.

#![allow(dead_code, clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use spool_gateway::api;
use spool_gateway::app_state::AppState;
use spool_gateway::config::{BasicAuth, GatewayConfig};

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const USER: &str = "admin";
pub const PASSWORD: &str = "hunter2";

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub http: reqwest::Client,
    auth: bool,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::with_config(GatewayConfig::default()).await
    }

    pub async fn with_auth() -> Self {
        let config = GatewayConfig {
            basic_auth: Some(BasicAuth {
                username: USER.to_string(),
                password: PASSWORD.to_string(),
            }),
            ..GatewayConfig::default()
        };
        Self::with_config(config).await
    }

    pub async fn with_config(config: GatewayConfig) -> Self {
        let auth = config.basic_auth.is_some();
        let state = AppState::new(config);
        let app = api::build_app(state.clone());
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("failed to bind test listener");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            addr,
            state,
            http: reqwest::Client::new(),
            auth,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{path}", self.addr)
    }

    /// Opens a WebSocket, sending credentials when auth is configured.
    pub async fn try_connect(&self, path: &str) -> Result<Ws, WsError> {
        let mut request = self.ws_url(path).into_client_request()?;
        if self.auth {
            let token = BASE64_STANDARD.encode(format!("{USER}:{PASSWORD}"));
            let Ok(value) = HeaderValue::from_str(&format!("Basic {token}")) else {
                panic!("invalid header value");
            };
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        let (ws, _response) = tokio_tungstenite::connect_async(request).await?;
        Ok(ws)
    }

    /// Opens a WebSocket and waits until the session is registered.
    pub async fn connect(&self, path: &str) -> Ws {
        let Ok(mut ws) = self.try_connect(path).await else {
            panic!("websocket connect to {path} failed");
        };
        expect_heartbeat(&mut ws).await;
        ws
    }

    pub async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        let mut request = self.http.post(self.url(path)).json(&body);
        if self.auth {
            request = request.basic_auth(USER, Some(PASSWORD));
        }
        let Ok(response) = request.send().await else {
            panic!("POST {path} failed");
        };
        response
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        let mut request = self.http.get(self.url(path));
        if self.auth {
            request = request.basic_auth(USER, Some(PASSWORD));
        }
        let Ok(response) = request.send().await else {
            panic!("GET {path} failed");
        };
        response
    }

    /// Creates an item and returns its id.
    pub async fn create(&self, kind: &str, body: Value) -> u64 {
        let response = self.post(&format!("/api/v1/{kind}"), body).await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let Ok(item) = response.json::<Value>().await else {
            panic!("invalid create response");
        };
        let Some(id) = item.get("id").and_then(Value::as_u64) else {
            panic!("created item has no id");
        };
        id
    }

    /// Polls until the registry holds `sessions` sessions.
    pub async fn wait_for_sessions(&self, sessions: usize) {
        let registry = self.state.registry();
        let reached = tokio::time::timeout(Duration::from_secs(5), async {
            while registry.session_count() != sessions {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(
            reached.is_ok(),
            "expected {sessions} sessions, found {}",
            registry.session_count()
        );
    }
}

/// Sends a liveness check and expects the heartbeat back.
pub async fn expect_heartbeat(ws: &mut Ws) {
    let sent = ws.send(Message::text("ping")).await;
    assert!(sent.is_ok());
    let reply = next_json(ws).await;
    assert_eq!(reply.get("kind").and_then(Value::as_str), Some("heartbeat"));
    assert_eq!(reply.get("status").and_then(Value::as_str), Some("healthy"));
}

/// Returns the next text frame as JSON, skipping control frames.
pub async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let Ok(Some(Ok(message))) = tokio::time::timeout(Duration::from_secs(5), ws.next()).await
        else {
            panic!("no message received");
        };
        match message {
            Message::Text(text) => {
                let Ok(value) = serde_json::from_str(text.as_str()) else {
                    panic!("invalid json: {text}");
                };
                return value;
            }
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Sends a JSON command.
pub async fn send_json(ws: &mut Ws, value: &Value) {
    let sent = ws.send(Message::text(value.to_string())).await;
    assert!(sent.is_ok());
}

/// Expects the upgrade to be refused with `status`.
pub fn assert_http_status(result: Result<Ws, WsError>, status: u16) {
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), status),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("upgrade unexpectedly succeeded"),
    }
}
