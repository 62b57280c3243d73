//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and the session run.

use std::path::PathBuf;

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: spikegraph_core::config::ConfigError,
    },

    /// Session construction failed.
    #[error("session error: {source}")]
    Session {
        /// The underlying session error.
        #[from]
        source: spikegraph_core::session::SessionError,
    },

    /// Session runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: spikegraph_core::runner::RunnerError,
    },

    /// Observer API server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: spikegraph_observer::ServerError,
    },

    /// The static link file could not be read.
    #[error("failed to read {path}: {source}")]
    StaticLinksIo {
        /// Path of the static link file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The static link file is not a JSON array.
    #[error("static link file is not a JSON array: {source}")]
    StaticLinksFormat {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
