//! Live file-listing WebSocket handler.
//!
//! Each connection subscribes to the change notifier. The current listing
//! is sent as soon as the connection opens, and again after every change.
//! Messages from the client are ignored apart from close and ping.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

use crate::notify::ChangeNotifier;
use crate::web::dto::WsQuery;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// WebSocket file-update handler.
///
/// GET /  (upgrade), optionally `?token=<session token>`
///
/// The token is only checked when the server is configured to require it.
pub async fn file_updates_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> Response {
    if state.require_ws_token {
        let verified = query
            .token
            .as_deref()
            .map(|token| state.tokens.verify(token));

        match verified {
            Some(Ok(claims)) => {
                tracing::debug!(username = %claims.username, "WebSocket observer authenticated");
            }
            Some(Err(e)) => {
                tracing::debug!("WebSocket connection rejected: {}", e);
                return ApiError::unauthorized("Invalid or expired token").into_response();
            }
            None => {
                tracing::debug!("WebSocket connection rejected: missing token");
                return ApiError::unauthorized("Missing authorization").into_response();
            }
        }
    }

    let notifier = Arc::clone(&state.notifier);
    ws.on_upgrade(move |socket| handle_socket(socket, notifier))
}

/// Handle a WebSocket connection until either side goes away.
async fn handle_socket(socket: WebSocket, notifier: Arc<ChangeNotifier>) {
    let mut subscription = notifier.subscribe();
    let observer = subscription.id();
    tracing::info!(%observer, "File observer connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            push = subscription.recv() => {
                match push {
                    Some(text) => {
                        if ws_sender.send(Message::Text(text.to_string())).await.is_err() {
                            break;
                        }
                    }
                    // Dropped by the notifier for falling behind
                    None => {
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(%observer, "WebSocket closed by client");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    drop(subscription);
    tracing::info!(%observer, "File observer disconnected");
}
