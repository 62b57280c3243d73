//! Observer API server for spikegraph.
//!
//! This crate provides an Axum HTTP server that renderers attach to:
//!
//! - **`WebSocket` endpoint** (`/ws/graph`) streaming the initial graph,
//!   model deltas, layout frames and pass-through messages, and
//!   accepting drag, resize and typed-input gestures from the client
//! - **REST endpoints** for the current graph, layout frame,
//!   pass-through log and counters
//! - **Control endpoints** for pause, resume, speed, status and stop
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! The observer reads from an in-memory [`ObserverSnapshot`] that the
//! engine updates as the session changes, so REST reads never block the
//! session loop. Client messages flow back to the session through a
//! bounded queue and are applied in arrival order.
//!
//! [`ObserverSnapshot`]: state::ObserverSnapshot

pub mod control;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{start_server, ServerError};
pub use startup::{spawn_observer, ObserverHandle};
pub use state::{AppState, ObserverBroadcast, ObserverSnapshot};
