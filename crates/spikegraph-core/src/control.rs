//! Shared control state for a running session.
//!
//! [`SessionControl`] is shared between the session runner and the
//! observer's control endpoints. Pausing freezes the layout only: inbound
//! messages and gestures keep being applied while the physics stands
//! still. A stop request ends the runner after the message or tick in
//! progress completes.
//!
//! All mutable fields are atomics so the runner reads them without locks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use crate::config::SessionConfig;

/// Reason a session run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// A stop was requested through the control state.
    OperatorStop,
}

/// Shared control state of one session.
#[derive(Debug)]
pub struct SessionControl {
    /// Whether layout ticking is frozen.
    paused: AtomicBool,

    /// Wakes the runner on resume or stop.
    wake: Notify,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Milliseconds between layout ticks (runtime-adjustable).
    tick_interval_ms: AtomicU64,

    /// Ticks executed so far.
    ticks: AtomicU64,

    /// Wall-clock time when the session started.
    started_at: DateTime<Utc>,

    /// Maximum number of ticks (0 = unlimited).
    max_ticks: u64,

    /// Reason the session ended, if it has.
    end_reason: Mutex<Option<SessionEndReason>>,
}

impl SessionControl {
    /// Create control state from the session configuration.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            paused: AtomicBool::new(false),
            wake: Notify::new(),
            stop_requested: AtomicBool::new(false),
            tick_interval_ms: AtomicU64::new(config.tick_interval_ms),
            ticks: AtomicU64::new(0),
            started_at: Utc::now(),
            max_ticks: config.max_ticks,
            end_reason: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Check whether layout ticking is frozen.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Freeze layout ticking.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume layout ticking and wake the runner.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.wake.notify_one();
    }

    /// Wait until [`resume`](Self::resume) or
    /// [`request_stop`](Self::request_stop) is called.
    pub async fn changed(&self) {
        self.wake.notified().await;
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean stop.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Record the reason the session ended.
    pub async fn set_end_reason(&self, reason: SessionEndReason) {
        let mut guard = self.end_reason.lock().await;
        *guard = Some(reason);
    }

    /// Get the reason the session ended, if it has.
    pub async fn end_reason(&self) -> Option<SessionEndReason> {
        *self.end_reason.lock().await
    }

    // -----------------------------------------------------------------------
    // Tick speed and counters
    // -----------------------------------------------------------------------

    /// Get the current tick interval in milliseconds.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Set the tick interval in milliseconds.
    ///
    /// Returns the previous interval, or `None` if `ms` is zero.
    pub fn set_tick_interval_ms(&self, ms: u64) -> Option<u64> {
        if ms == 0 {
            return None;
        }
        Some(self.tick_interval_ms.swap(ms, Ordering::AcqRel))
    }

    /// Record one executed tick and return the new total.
    pub fn record_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    /// Ticks executed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Check whether the tick limit has been reached.
    ///
    /// Returns `true` if `max_ticks > 0` and `ticks >= max_ticks`.
    pub const fn tick_limit_reached(&self, ticks: u64) -> bool {
        self.max_ticks > 0 && ticks >= self.max_ticks
    }

    /// Get the configured max ticks.
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Return elapsed seconds since the session started.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }

    /// Build the JSON-serializable status.
    pub async fn status(&self) -> SessionStatus {
        SessionStatus {
            ticks: self.ticks(),
            paused: self.is_paused(),
            stop_requested: self.is_stop_requested(),
            tick_interval_ms: self.tick_interval_ms(),
            elapsed_seconds: self.elapsed_seconds(),
            max_ticks: self.max_ticks,
            end_reason: self.end_reason().await,
            started_at: self.started_at.to_rfc3339(),
        }
    }
}

/// JSON-serializable status of a session for the control API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Ticks executed so far.
    pub ticks: u64,
    /// Whether layout ticking is frozen.
    pub paused: bool,
    /// Whether a stop has been requested.
    pub stop_requested: bool,
    /// Current tick interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Elapsed wall-clock seconds since start.
    pub elapsed_seconds: u64,
    /// Configured maximum ticks (0 = unlimited).
    pub max_ticks: u64,
    /// The reason the session ended, if it has.
    pub end_reason: Option<SessionEndReason>,
    /// ISO 8601 timestamp of when the session started.
    pub started_at: String,
}
