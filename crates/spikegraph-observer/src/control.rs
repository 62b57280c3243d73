//! Control REST API handlers for a running session.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/control/pause` | Freeze the layout |
//! | `POST` | `/api/control/resume` | Resume the layout |
//! | `POST` | `/api/control/speed` | Set tick interval (ms) |
//! | `GET` | `/api/control/status` | Current session status |
//! | `POST` | `/api/control/stop` | End the session |

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::ObserverError;
use crate::state::AppState;

/// Request body for `POST /api/control/speed`.
#[derive(Debug, serde::Deserialize)]
pub struct SetSpeedRequest {
    /// New tick interval in milliseconds (must be positive).
    pub tick_interval_ms: u64,
}

/// Generic success response.
#[derive(Debug, serde::Serialize)]
struct ControlResponse {
    /// Whether the operation succeeded.
    ok: bool,
    /// Human-readable message.
    message: String,
}

/// Freeze the layout. Inbound messages and gestures are still applied.
pub async fn pause(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    state.control()?.pause();

    Ok(Json(ControlResponse {
        ok: true,
        message: "Layout paused".to_owned(),
    }))
}

/// Resume the layout after a pause.
pub async fn resume(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    state.control()?.resume();

    Ok(Json(ControlResponse {
        ok: true,
        message: "Layout resumed".to_owned(),
    }))
}

/// Change the tick interval at runtime.
///
/// The runner picks the new interval up before its next tick.
pub async fn set_speed(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetSpeedRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let control = state.control()?;

    control.set_tick_interval_ms(body.tick_interval_ms).map_or_else(
        || {
            Err(ObserverError::InvalidRequest {
                reason: "tick_interval_ms must be positive".to_owned(),
            })
        },
        |prev| {
            Ok(Json(serde_json::json!({
                "ok": true,
                "message": format!("Tick interval changed from {}ms to {}ms", prev, body.tick_interval_ms),
                "previous_interval_ms": prev,
                "new_interval_ms": body.tick_interval_ms,
            })))
        },
    )
}

/// Return the current session status.
pub async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let status = state.control()?.status().await;
    Ok(Json(status))
}

/// End the session.
///
/// The runner finishes the message or tick in progress and returns. The
/// HTTP server keeps serving the last snapshot.
pub async fn stop(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    state.control()?.request_stop();

    Ok(Json(ControlResponse {
        ok: true,
        message: "Stop requested -- session will end after the current step".to_owned(),
    }))
}
