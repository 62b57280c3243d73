//! Observer server startup helper for embedding in the engine binary.
//!
//! [`spawn_observer`] binds the listening socket up front, so a port
//! conflict fails startup instead of surfacing later in a log line, and
//! then serves on a background Tokio task alongside the session loop.

use std::net::SocketAddr;
use std::sync::Arc;

use spikegraph_core::config::ObserverConfig;
use tokio::task::JoinHandle;

use crate::server::{self, ServerError};
use crate::state::AppState;

/// A running Observer server.
#[derive(Debug)]
pub struct ObserverHandle {
    /// The address actually bound (useful when port 0 was requested).
    pub addr: SocketAddr,
    /// The background serving task.
    pub task: JoinHandle<()>,
}

/// Bind the configured address and serve on a background task.
///
/// # Errors
///
/// Returns a [`ServerError`] if the address is invalid or cannot be
/// bound. Errors while serving are logged by the background task.
pub async fn spawn_observer(
    config: &ObserverConfig,
    state: Arc<AppState>,
) -> Result<ObserverHandle, ServerError> {
    let listener = server::bind(config).await?;
    let addr = listener.local_addr()?;

    let task = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
    });

    tracing::info!(%addr, "Observer server spawned on background task");

    Ok(ObserverHandle { addr, task })
}
