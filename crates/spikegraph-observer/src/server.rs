//! Observer HTTP server lifecycle management.
//!
//! [`bind`] resolves and binds the listening socket; [`serve`] runs the
//! Axum server on it until the process is terminated.

use std::net::SocketAddr;
use std::sync::Arc;

use spikegraph_core::config::ObserverConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Errors that can occur when starting or running the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured address is not a valid socket address.
    #[error("invalid address {addr}: {reason}")]
    InvalidAddress {
        /// The `host:port` string that failed to parse.
        addr: String,
        /// Parser message.
        reason: String,
    },

    /// Failed to bind to the network address.
    #[error("bind failed on {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The server encountered a fatal error while serving.
    #[error("serve error: {source}")]
    Serve {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

/// Bind the listening socket described by `config`.
///
/// # Errors
///
/// Returns [`ServerError::InvalidAddress`] if host and port do not form a
/// socket address, or [`ServerError::Bind`] if the bind fails.
pub async fn bind(config: &ObserverConfig) -> Result<TcpListener, ServerError> {
    let raw = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = raw.parse().map_err(|e: std::net::AddrParseError| {
        ServerError::InvalidAddress {
            addr: raw.clone(),
            reason: e.to_string(),
        }
    })?;

    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Serve the Observer API on an already bound listener.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Observer server listening");
    }

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

/// Bind and serve the Observer API until the process is terminated.
///
/// # Errors
///
/// Returns an error if binding or serving fails.
pub async fn start_server(config: &ObserverConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let listener = bind(config).await?;
    serve(listener, state).await
}
