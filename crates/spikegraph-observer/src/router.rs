//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled so a renderer served from another origin
//! can attach.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::control;
use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/graph` -- `WebSocket` graph stream and gesture input
/// - `GET /api/graph` -- current graph snapshot
/// - `GET /api/layout` -- latest layout frame
/// - `GET /api/messages` -- pass-through log
/// - `GET /api/stats` -- session counters
/// - `POST /api/gestures` -- queue a client message
/// - `/api/control/*` -- pause, resume, speed, status, stop
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/graph", get(ws::ws_graph))
        // REST API
        .route("/api/graph", get(handlers::get_graph))
        .route("/api/layout", get(handlers::get_layout))
        .route("/api/messages", get(handlers::list_messages))
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/gestures", post(handlers::post_gesture))
        // Control API
        .route("/api/control/pause", post(control::pause))
        .route("/api/control/resume", post(control::resume))
        .route("/api/control/speed", post(control::set_speed))
        .route("/api/control/status", get(control::status))
        .route("/api/control/stop", post(control::stop))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
