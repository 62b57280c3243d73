//! REST API endpoint handlers for the Observer server.
//!
//! Read handlers serve the in-memory [`ObserverSnapshot`] through the
//! shared [`AppState`]. The gesture handler is the HTTP alternative to
//! sending a client message over the `WebSocket`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/graph` | Current graph snapshot |
//! | `GET` | `/api/layout` | Latest layout frame |
//! | `GET` | `/api/messages` | Pass-through log (newest `limit`) |
//! | `GET` | `/api/stats` | Session counters |
//! | `POST` | `/api/gestures` | Queue a client message |
//!
//! [`ObserverSnapshot`]: crate::state::ObserverSnapshot

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::Json;
use spikegraph_types::ClientMessage;

use crate::error::ObserverError;
use crate::state::AppState;

/// Default number of pass-through entries returned by `/api/messages`.
const DEFAULT_MESSAGE_LIMIT: usize = 100;

/// Query parameters for the `GET /api/messages` endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct MessagesQuery {
    /// Maximum number of entries to return (default 100).
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing session counters and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    let stats = snapshot.stats;
    let alpha = snapshot.frame.alpha;
    let phase = if snapshot.frame.settled {
        "SETTLED"
    } else {
        "MOVING"
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Spikegraph Observer</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .status {{ color: #3fb950; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Spikegraph Observer</h1>
    <p>Layout: <span class="status">{phase}</span> (alpha {alpha:.3})</p>

    <div>
        <div class="metric"><div class="label">Nodes</div><div class="value">{nodes}</div></div>
        <div class="metric"><div class="label">Visible</div><div class="value">{visible}</div></div>
        <div class="metric"><div class="label">Edges</div><div class="value">{edges}</div></div>
        <div class="metric"><div class="label">Pinned</div><div class="value">{pinned}</div></div>
        <div class="metric"><div class="label">Ticks</div><div class="value">{ticks}</div></div>
        <div class="metric"><div class="label">Rejected</div><div class="value">{rejected}</div></div>
    </div>

    <h2>API</h2>
    <ul>
        <li>GET <a href="/api/graph">/api/graph</a></li>
        <li>GET <a href="/api/layout">/api/layout</a></li>
        <li>GET <a href="/api/messages">/api/messages</a></li>
        <li>GET <a href="/api/stats">/api/stats</a></li>
        <li>GET <a href="/api/control/status">/api/control/status</a></li>
        <li>WS /ws/graph</li>
    </ul>
</body>
</html>"#,
        nodes = stats.nodes,
        visible = stats.visible_nodes,
        edges = stats.edges,
        pinned = stats.pinned_nodes,
        ticks = stats.ticks,
        rejected = stats.rejected,
    ))
}

// ---------------------------------------------------------------------------
// GET /api/graph
// ---------------------------------------------------------------------------

/// Return the current graph snapshot.
///
/// Returns 404 until the engine has published its first snapshot.
pub async fn get_graph(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let snapshot = state.snapshot.read().await;
    let graph = snapshot.graph.clone().ok_or_else(|| ObserverError::NotFound {
        what: "graph snapshot".to_owned(),
    })?;
    Ok(Json(graph))
}

// ---------------------------------------------------------------------------
// GET /api/layout
// ---------------------------------------------------------------------------

/// Return the latest layout frame.
pub async fn get_layout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    Json(snapshot.frame.clone())
}

// ---------------------------------------------------------------------------
// GET /api/messages
// ---------------------------------------------------------------------------

/// Return the newest pass-through entries, oldest first.
///
/// # Query Parameters
///
/// - `limit` -- max entries to return (default 100, must be positive)
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MessagesQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let limit = params.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT);
    if limit == 0 {
        return Err(ObserverError::InvalidRequest {
            reason: "limit must be positive".to_owned(),
        });
    }

    let snapshot = state.snapshot.read().await;
    let skip = snapshot.messages.len().saturating_sub(limit);
    let messages: Vec<_> = snapshot.messages.iter().skip(skip).cloned().collect();

    Ok(Json(serde_json::json!({
        "count": messages.len(),
        "messages": messages,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/stats
// ---------------------------------------------------------------------------

/// Return the session counters.
pub async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    Json(snapshot.stats)
}

// ---------------------------------------------------------------------------
// POST /api/gestures
// ---------------------------------------------------------------------------

/// Queue a client message (drag gesture or typed input) for the session.
///
/// Returns 202 once the message is queued. The session applies it in
/// arrival order with messages received over the `WebSocket`.
pub async fn post_gesture(
    State(state): State<Arc<AppState>>,
    Json(message): Json<ClientMessage>,
) -> Result<impl IntoResponse, ObserverError> {
    state.forward(message)?;
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "ok": true }))))
}
