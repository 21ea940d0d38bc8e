//! WebSocket notification tests.
//!
//! These run a real server on a random port and connect with a WebSocket
//! client to observe file-update pushes.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use filebox::config::Config;
use filebox::web::handlers::AppState;
use filebox::web::WebServer;

use common::create_test_config;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(adjust: impl FnOnce(&mut Config)) -> (TempDir, Arc<AppState>, SocketAddr) {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    adjust(&mut config);

    let state = Arc::new(AppState::open(&config).await.unwrap());
    let server = WebServer::with_state(&config, Arc::clone(&state)).unwrap();
    let addr = server.run_with_addr().await.unwrap();

    (dir, state, addr)
}

/// Wait for the next text frame and parse it.
async fn next_update(ws: &mut WsClient) -> Value {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for update")
            .expect("stream ended")
            .expect("websocket error");

        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_connect_receives_current_listing() {
    let (_dir, state, addr) = start_server(|_| {}).await;
    state.files.upload("admin", "early.txt", b"hi").await.unwrap();

    let (mut ws, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    let update = next_update(&mut ws).await;

    assert_eq!(update["type"], "file-update");
    assert_eq!(update["files"].as_array().unwrap().len(), 1);
    assert_eq!(update["files"][0]["name"], "early.txt");
    assert_eq!(update["files"][0]["size"], 2);
}

#[tokio::test]
async fn test_mutations_are_pushed() {
    let (_dir, state, addr) = start_server(|_| {}).await;

    let (mut ws, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    let initial = next_update(&mut ws).await;
    assert!(initial["files"].as_array().unwrap().is_empty());

    let record = state.files.upload("admin", "new.txt", b"abc").await.unwrap();
    let update = next_update(&mut ws).await;
    assert_eq!(update["files"][0]["id"], record.id.as_str());

    state.files.delete(&record.id).await.unwrap();
    let update = next_update(&mut ws).await;
    assert!(update["files"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_every_observer_is_notified() {
    let (_dir, state, addr) = start_server(|_| {}).await;

    let (mut first, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    let (mut second, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    next_update(&mut first).await;
    next_update(&mut second).await;

    state.files.upload("admin", "shared.txt", b"x").await.unwrap();

    for ws in [&mut first, &mut second] {
        let update = next_update(ws).await;
        assert_eq!(update["files"][0]["name"], "shared.txt");
    }
}

#[tokio::test]
async fn test_closed_observer_is_unsubscribed() {
    let (_dir, state, addr) = start_server(|_| {}).await;

    let (mut ws, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    next_update(&mut ws).await;
    assert_eq!(state.notifier.subscriber_count(), 1);

    ws.close(None).await.unwrap();
    drop(ws);

    // The server notices the close asynchronously
    timeout(WAIT, async {
        while state.notifier.subscriber_count() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber was not removed");

    // Broadcasting with nobody listening is fine
    state.files.upload("admin", "after.txt", b"x").await.unwrap();
}

#[tokio::test]
async fn test_required_token() {
    let (_dir, state, addr) = start_server(|config| config.server.require_ws_token = true).await;

    assert!(connect_async(format!("ws://{}/", addr)).await.is_err());
    assert!(connect_async(format!("ws://{}/?token=garbage", addr))
        .await
        .is_err());

    let token = state.tokens.issue("admin");
    let (mut ws, _) = connect_async(format!("ws://{}/?token={}", addr, token))
        .await
        .unwrap();
    let update = next_update(&mut ws).await;
    assert_eq!(update["type"], "file-update");
}
