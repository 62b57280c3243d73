//! Session loop runner.
//!
//! This module provides [`run_session`], the async function that drives a
//! [`Session`] from two ordered queues and a tick timer:
//!
//! - **Inbound queue**: raw JSON lines from the reasoning system, applied
//!   strictly in arrival order, one at a time.
//! - **Gesture queue**: [`ClientMessage`]s from renderer clients.
//! - **Tick timer**: one layout step per `tick_interval_ms`.
//!
//! The three are interleaved by a biased `select!`; whichever branch wins
//! runs to completion before the next one is polled, so observers never
//! see a half-applied message. When the inbound queue closes, the session
//! keeps ticking its last consistent state until a stop is requested or
//! `max_ticks` is reached.
//!
//! [`ClientMessage`]: spikegraph_types::ClientMessage

use std::sync::Arc;
use std::time::Duration;

use spikegraph_types::{ClientMessage, GraphDelta, LayoutFrame, PassthroughEntry};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::control::{SessionControl, SessionEndReason};
use crate::session::{IngestOutcome, Session};

/// Errors that can occur during the session run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The tick interval is zero.
    #[error("tick interval must be positive")]
    ZeroTickInterval,
}

/// Result of the session run.
#[derive(Debug)]
pub struct SessionResult {
    /// The reason the run ended.
    pub end_reason: SessionEndReason,
    /// Total number of ticks executed.
    pub total_ticks: u64,
    /// Total number of inbound messages processed.
    pub total_messages: u64,
}

/// The queues a session is driven from.
#[derive(Debug)]
pub struct SessionQueues {
    /// Raw inbound messages in arrival order.
    pub inbound: mpsc::Receiver<String>,
    /// Messages from renderer clients.
    pub gestures: mpsc::Receiver<ClientMessage>,
}

/// Callback invoked as the session changes.
///
/// Implementations can use this to update the observer snapshot,
/// broadcast deltas and frames, etc.
pub trait SessionCallback: Send {
    /// Called after an inbound message was applied to the model.
    fn on_model_change(&mut self, delta: &GraphDelta, session: &Session);

    /// Called after a pass-through message was recorded.
    fn on_passthrough(&mut self, _entry: &PassthroughEntry, _session: &Session) {}

    /// Called after each layout tick.
    fn on_tick(&mut self, frame: &LayoutFrame, session: &Session);
}

/// A no-op callback for testing.
pub struct NoOpCallback;

impl SessionCallback for NoOpCallback {
    fn on_model_change(&mut self, _delta: &GraphDelta, _session: &Session) {}

    fn on_tick(&mut self, _frame: &LayoutFrame, _session: &Session) {}
}

/// Run the session loop until a termination condition is met.
///
/// # Arguments
///
/// * `session` - The session to drive
/// * `queues` - Inbound and gesture queues
/// * `control` - Shared control state (pause, stop, tick speed)
/// * `callback` - Notified after every change
///
/// # Errors
///
/// Returns [`RunnerError::ZeroTickInterval`] if the configured interval is
/// zero.
pub async fn run_session(
    session: &mut Session,
    queues: SessionQueues,
    control: &Arc<SessionControl>,
    callback: &mut dyn SessionCallback,
) -> Result<SessionResult, RunnerError> {
    let SessionQueues {
        mut inbound,
        mut gestures,
    } = queues;
    let mut interval_ms = control.tick_interval_ms();
    let mut ticker = make_ticker(interval_ms)?;
    let mut inbound_open = true;
    let mut gestures_open = true;
    let mut total_messages: u64 = 0;

    info!(
        max_ticks = control.max_ticks(),
        tick_interval_ms = interval_ms,
        "Session starting"
    );

    let end_reason = loop {
        if control.is_stop_requested() {
            info!("Operator stop requested");
            break SessionEndReason::OperatorStop;
        }

        let paused = control.is_paused();
        tokio::select! {
            biased;

            gesture = gestures.recv(), if gestures_open => {
                match gesture {
                    Some(message) => apply_gesture(session, message, callback),
                    None => gestures_open = false,
                }
            }

            _ = ticker.tick(), if !paused => {
                let frame = session.tick();
                let ticks = control.record_tick();
                callback.on_tick(&frame, session);
                if control.tick_limit_reached(ticks) {
                    info!(ticks, max_ticks = control.max_ticks(), "Tick limit reached");
                    break SessionEndReason::MaxTicksReached;
                }

                let requested = control.tick_interval_ms();
                if requested != interval_ms {
                    info!(from = interval_ms, to = requested, "Tick interval changed");
                    interval_ms = requested;
                    ticker = make_ticker(interval_ms)?;
                }
            }

            line = inbound.recv(), if inbound_open => {
                match line {
                    Some(raw) => {
                        total_messages = total_messages.saturating_add(1);
                        match session.ingest(&raw) {
                            IngestOutcome::Applied(delta) => callback.on_model_change(&delta, session),
                            IngestOutcome::Passthrough(entry) => callback.on_passthrough(&entry, session),
                            IngestOutcome::Rejected => {}
                        }
                    }
                    None => {
                        inbound_open = false;
                        info!(total_messages, "Inbound stream closed, holding last state");
                    }
                }
            }

            () = control.changed(), if paused => {}
        }
    };

    control.set_end_reason(end_reason).await;
    Ok(SessionResult {
        end_reason,
        total_ticks: control.ticks(),
        total_messages,
    })
}

fn apply_gesture(session: &mut Session, message: ClientMessage, callback: &mut dyn SessionCallback) {
    match session.gesture(message) {
        Ok(Some(entry)) => callback.on_passthrough(&entry, session),
        Ok(None) => {}
        Err(err) => warn!(error = %err, "Ignoring client gesture"),
    }
}

fn make_ticker(interval_ms: u64) -> Result<Interval, RunnerError> {
    if interval_ms == 0 {
        return Err(RunnerError::ZeroTickInterval);
    }
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Ok(ticker)
}

/// Log the session end.
pub fn log_session_end(result: &SessionResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        total_messages = result.total_messages,
        "Session ended"
    );
}
