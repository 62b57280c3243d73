//! Spikegraph engine binary.
//!
//! Reads the reasoning system's event stream as JSON lines on stdin,
//! reconciles it into the graph model, runs the force layout, and serves
//! both to renderer clients through the observer API.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `spikegraph-config.yaml` (or the path in
//!    `SPIKEGRAPH_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the session and apply the optional static link file
//! 4. Create the control state and the inbound and gesture queues
//! 5. Start the observer API server
//! 6. Start the stdin reader
//! 7. Run the session loop until a stop or the tick limit
//! 8. Log the result

mod error;
mod observer_callback;
mod source;

use std::path::PathBuf;
use std::sync::Arc;

use spikegraph_core::config::{LogFormat, LoggingConfig, SpikegraphConfig};
use spikegraph_core::control::SessionControl;
use spikegraph_core::runner::{self, SessionQueues};
use spikegraph_core::session::Session;
use spikegraph_observer::state::AppState;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::observer_callback::ObserverCallback;

/// Capacity of the inbound line queue.
const INBOUND_QUEUE_CAPACITY: usize = 1024;

/// Capacity of the renderer gesture queue.
const GESTURE_QUEUE_CAPACITY: usize = 256;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "spikegraph-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the session run fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let (config, config_found) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("spikegraph-engine starting");
    if !config_found {
        info!("Config file not found, using defaults");
    }
    info!(
        width = config.viewport.width,
        height = config.viewport.height,
        tick_interval_ms = config.session.tick_interval_ms,
        max_ticks = config.session.max_ticks,
        "Configuration loaded"
    );

    // 3. Create the session.
    let mut session = Session::new(&config)?;
    if let Some(path) = &config.session.static_links_path {
        let links = source::load_static_links(path).await?;
        let delta = session.apply_static_links(links);
        info!(
            path = %path.display(),
            nodes = delta.added_nodes.len(),
            edges = delta.added_edges.len(),
            "Static links applied"
        );
    }

    // 4. Control state and queues.
    let control = Arc::new(SessionControl::new(&config.session));
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
    let (gesture_tx, gesture_rx) = mpsc::channel(GESTURE_QUEUE_CAPACITY);

    // 5. Start the observer API server.
    let app_state = Arc::new(AppState::with_session(gesture_tx, Arc::clone(&control)));
    let observer = if config.observer.enabled {
        let handle =
            spikegraph_observer::spawn_observer(&config.observer, Arc::clone(&app_state)).await?;
        info!(addr = %handle.addr, "Observer API server started");
        Some(handle)
    } else {
        info!("Observer disabled");
        None
    };

    let mut callback = ObserverCallback::new(app_state);
    callback.publish(&session);

    // 6. Start reading events.
    let _stdin = source::spawn_stdin_source(inbound_tx);

    // 7. Run the session.
    let queues = SessionQueues {
        inbound: inbound_rx,
        gestures: gesture_rx,
    };
    let result = runner::run_session(&mut session, queues, &control, &mut callback).await?;

    // 8. Log results.
    runner::log_session_end(&result);

    if let Some(handle) = observer {
        info!("Observer still serving the final state, press Ctrl-C to exit");
        tokio::signal::ctrl_c()
            .await
            .map_err(|source| EngineError::Signal { source })?;
        handle.task.abort();
    }

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "spikegraph-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from `SPIKEGRAPH_CONFIG` or the default path.
///
/// Returns the configuration and whether a file was found. A missing
/// file yields the defaults (with environment overrides applied).
fn load_config() -> Result<(SpikegraphConfig, bool), EngineError> {
    let path = std::env::var_os("SPIKEGRAPH_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        return Ok((SpikegraphConfig::from_file(&path)?, true));
    }

    let mut config = SpikegraphConfig::default();
    config.observer.apply_env_overrides();
    config.validate()?;
    Ok((config, false))
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to
/// stderr so stdout stays free for tooling.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match config.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
