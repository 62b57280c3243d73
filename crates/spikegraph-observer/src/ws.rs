//! `WebSocket` handler for renderer clients.
//!
//! Clients connect to `GET /ws/graph`. On connect they receive the
//! current graph and layout frame as an [`ObserverBroadcast::Snapshot`],
//! so nodes can be drawn before the next tick, then every model
//! delta, layout frame and pass-through entry as it happens. Text frames
//! sent by the client are parsed as [`ClientMessage`]s and queued for the
//! session.
//!
//! If a client falls behind, lagged messages are skipped and the client
//! resumes from the most recent message.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use spikegraph_types::ClientMessage;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::{AppState, ObserverBroadcast};

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming graph updates.
///
/// # Route
///
/// `GET /ws/graph`
pub async fn ws_graph(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Serialize a broadcast and send it as a text frame.
///
/// Returns `false` once the client is gone.
async fn send_broadcast(socket: &mut WebSocket, message: &ObserverBroadcast) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize observer broadcast: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Parse a client text frame and queue it for the session.
fn forward_client_text(state: &AppState, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => {
            if let Err(e) = state.forward(message) {
                warn!(error = %e, "Dropped client message");
            }
        }
        Err(e) => warn!(error = %e, "Ignored unparseable client frame"),
    }
}

/// Handle the `WebSocket` lifecycle.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("WebSocket client connected");

    // Subscribe before reading the snapshot so no delta published in
    // between is missed.
    let mut rx = state.subscribe();

    if let Some(initial) = state.initial_snapshot().await {
        if !send_broadcast(&mut socket, &initial).await {
            debug!("WebSocket client disconnected (snapshot send failed)");
            return;
        }
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(message) => {
                        if !send_broadcast(&mut socket, &message).await {
                            debug!("WebSocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Broadcast channel closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Text(text))) => {
                        forward_client_text(&state, text.as_str());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return;
                    }
                    _ => {
                        // Binary and pong frames carry nothing for us.
                    }
                }
            }
        }
    }
}
