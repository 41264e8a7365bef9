//! End-to-end WebSocket notification tests against a live server.

#![allow(clippy::panic)]

mod common;

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

use common::{TestServer, assert_http_status, expect_heartbeat, next_json, send_json};
use spool_gateway::config::{GatewayConfig, SessionSettings};

#[tokio::test]
async fn root_session_answers_text_with_heartbeat() {
    let server = TestServer::start().await;
    let mut ws = server.connect("/api/v1/").await;
    expect_heartbeat(&mut ws).await;
    server.wait_for_sessions(1).await;
}

#[tokio::test]
async fn root_without_trailing_slash_also_upgrades() {
    let server = TestServer::start().await;
    let _ws = server.connect("/api/v1").await;
    server.wait_for_sessions(1).await;
}

#[tokio::test]
async fn kind_and_entity_sessions_receive_matching_changes() {
    let server = TestServer::start().await;
    let filament = server.create("filament", json!({"material": "PETG"})).await;
    let spool_1 = server
        .create("spool", json!({"filament_id": filament, "remaining_weight": 1000}))
        .await;

    let mut all_spools = server.connect("/api/v1/spool").await;
    let mut one_spool = server.connect(&format!("/api/v1/spool/{spool_1}")).await;
    let mut vendors = server.connect("/api/v1/vendor").await;
    let mut root = server.connect("/api/v1/").await;

    let response = server
        .http
        .patch(server.url(&format!("/api/v1/spool/{spool_1}")))
        .json(&json!({"remaining_weight": 640}))
        .send()
        .await;
    assert!(response.is_ok_and(|r| r.status().is_success()));
    let spool_2 = server.create("spool", json!({"filament_id": filament})).await;

    // Kind subscriber sees both changes, in order.
    let first = next_json(&mut all_spools).await;
    assert_eq!(first.get("kind"), Some(&json!("change")));
    assert_eq!(first.get("topic"), Some(&json!(["spool", spool_1.to_string()])));
    assert_eq!(first.pointer("/payload/type"), Some(&json!("updated")));
    assert_eq!(first.pointer("/payload/payload/remaining_weight"), Some(&json!(640)));
    let second = next_json(&mut all_spools).await;
    assert_eq!(second.pointer("/payload/type"), Some(&json!("added")));
    assert_eq!(second.pointer("/payload/payload/id"), Some(&json!(spool_2)));

    // Entity subscriber sees only its own item.
    let own = next_json(&mut one_spool).await;
    assert_eq!(own.pointer("/payload/payload/id"), Some(&json!(spool_1)));
    expect_heartbeat(&mut one_spool).await;

    // Root sees everything.
    assert_eq!(next_json(&mut root).await.get("kind"), Some(&json!("change")));
    assert_eq!(next_json(&mut root).await.get("kind"), Some(&json!("change")));

    // Unrelated kind sees nothing: its next frame is the heartbeat reply.
    expect_heartbeat(&mut vendors).await;
}

#[tokio::test]
async fn delete_is_delivered_to_the_item_subscriber() {
    let server = TestServer::start().await;
    let vendor = server.create("vendor", json!({"name": "Polymaker"})).await;
    let mut ws = server.connect(&format!("/api/v1/vendor/{vendor}")).await;

    let response = server
        .http
        .delete(server.url(&format!("/api/v1/vendor/{vendor}")))
        .send()
        .await;
    assert!(response.is_ok_and(|r| r.status() == reqwest::StatusCode::NO_CONTENT));

    let message = next_json(&mut ws).await;
    assert_eq!(message.pointer("/payload/type"), Some(&json!("deleted")));
    assert_eq!(message.pointer("/payload/payload/name"), Some(&json!("Polymaker")));
}

#[tokio::test]
async fn missing_item_or_unknown_kind_is_rejected_before_upgrade() {
    let server = TestServer::start().await;
    assert_http_status(server.try_connect("/api/v1/spool/99").await, 404);
    assert_http_status(server.try_connect("/api/v1/printer").await, 404);
    assert!(server.state.registry().is_empty());
}

#[tokio::test]
async fn unauthenticated_upgrade_never_reaches_the_registry() {
    let server = TestServer::with_auth().await;
    let url = server.ws_url("/api/v1/");
    let result = tokio_tungstenite::connect_async(url).await.map(|(ws, _)| ws);
    assert_http_status(result, 401);
    assert!(server.state.registry().is_empty());

    let mut ws = server.connect("/api/v1/").await;
    expect_heartbeat(&mut ws).await;
}

#[tokio::test]
async fn reconnect_cycles_leave_no_registry_residue() {
    let server = TestServer::start().await;
    let baseline = server.state.registry().session_count();

    for _ in 0..20 {
        let mut ws = server.connect("/api/v1/spool").await;
        let closed = ws.close(None).await;
        assert!(closed.is_ok());
        server.wait_for_sessions(baseline).await;
    }
    assert_eq!(server.state.registry().subscription_count(), 0);
    assert_eq!(server.state.registry().topic_count(), 0);
}

#[tokio::test]
async fn dropped_connection_is_torn_down() {
    let server = TestServer::start().await;
    let ws = server.connect("/api/v1/filament").await;
    server.wait_for_sessions(1).await;
    drop(ws);
    server.wait_for_sessions(0).await;
}

#[tokio::test]
async fn subscribe_command_adds_a_topic_to_the_same_socket() {
    let server = TestServer::start().await;
    let filament = server.create("filament", json!({})).await;
    let mut ws = server.connect("/api/v1/vendor").await;

    send_json(&mut ws, &json!({"command": "subscribe", "topic": ["spool"]})).await;
    let ack = next_json(&mut ws).await;
    assert_eq!(ack, json!({"kind": "subscribed", "topic": ["spool"]}));

    let spool = server.create("spool", json!({"filament_id": filament})).await;
    let change = next_json(&mut ws).await;
    assert_eq!(change.get("topic"), Some(&json!(["spool", spool.to_string()])));

    send_json(&mut ws, &json!({"command": "unsubscribe", "topic": ["spool"]})).await;
    let ack = next_json(&mut ws).await;
    assert_eq!(ack.get("kind"), Some(&json!("unsubscribed")));

    let _ = server.create("spool", json!({"filament_id": filament})).await;
    expect_heartbeat(&mut ws).await;
}

#[tokio::test]
async fn server_shutdown_closes_sessions_and_refuses_new_ones() {
    let server = TestServer::start().await;
    let mut ws = server.connect("/api/v1/").await;
    server.wait_for_sessions(1).await;

    server.state.request_shutdown();

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
    server.wait_for_sessions(0).await;
    assert_http_status(server.try_connect("/api/v1/").await, 503);
}

#[tokio::test]
async fn idle_session_is_closed() {
    let config = GatewayConfig {
        session: SessionSettings {
            heartbeat_interval: Duration::from_millis(20),
            idle_timeout: Duration::from_millis(200),
            ..SessionSettings::default()
        },
        ..GatewayConfig::default()
    };
    let server = TestServer::with_config(config).await;
    let _ws = server.connect("/api/v1/").await;
    server.wait_for_sessions(0).await;
}

#[tokio::test]
async fn idle_session_is_pinged() {
    let config = GatewayConfig {
        session: SessionSettings {
            heartbeat_interval: Duration::from_millis(20),
            ping_interval: Duration::from_millis(100),
            ..SessionSettings::default()
        },
        ..GatewayConfig::default()
    };
    let server = TestServer::with_config(config).await;
    let mut ws = server.connect("/api/v1/").await;

    let pinged = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(Ok(Message::Ping(_))) = ws.next().await {
                break;
            }
        }
    })
    .await;
    assert!(pinged.is_ok());
}

#[tokio::test]
async fn notification_counters_track_sessions_and_events() {
    let server = TestServer::start().await;
    let mut ws = server.connect("/api/v1/vendor").await;
    let _ = server.create("vendor", json!({"name": "Sunlu"})).await;
    let _ = next_json(&mut ws).await;

    let Ok(stats) = server.get("/api/v1/notifications").await.json::<Value>().await else {
        panic!("invalid stats response");
    };
    assert_eq!(stats.get("sessions"), Some(&json!(1)));
    assert_eq!(stats.get("subscriptions"), Some(&json!(1)));
    assert_eq!(stats.get("events_published"), Some(&json!(1)));
    assert_eq!(stats.get("messages_queued"), Some(&json!(1)));
    assert_eq!(stats.get("messages_dropped"), Some(&json!(0)));
}
