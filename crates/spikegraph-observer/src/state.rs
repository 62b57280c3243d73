//! Shared application state for the Observer API server.
//!
//! [`AppState`] holds the broadcast channel that pushes model deltas and
//! layout frames to renderer clients, an in-memory [`ObserverSnapshot`]
//! served by the REST endpoints, and the handles back into the running
//! session: its gesture queue and its control state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use spikegraph_core::control::SessionControl;
use spikegraph_types::{
    ClientMessage, GraphDelta, GraphSnapshot, LayoutFrame, PassthroughEntry, SessionStats,
};
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::error::ObserverError;

/// Capacity of the broadcast channel.
///
/// If a subscriber falls behind by more than this many messages it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip to the
/// newest message.
const BROADCAST_CAPACITY: usize = 256;

/// Maximum pass-through entries mirrored into the snapshot.
pub const MAX_MESSAGES: usize = 1000;

/// JSON message pushed to renderer clients over the `WebSocket`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObserverBroadcast {
    /// Full graph and layout, sent once when a client connects.
    Snapshot {
        /// The current graph.
        graph: GraphSnapshot,
        /// The latest layout frame.
        frame: LayoutFrame,
    },
    /// The model changed after an inbound message.
    ModelChanged {
        /// What changed.
        delta: GraphDelta,
    },
    /// A layout tick completed.
    Frame {
        /// Positions after the tick.
        frame: LayoutFrame,
    },
    /// A pass-through message was recorded.
    Passthrough {
        /// The recorded entry.
        entry: PassthroughEntry,
    },
}

/// In-memory snapshot of the session served by REST endpoints.
///
/// Updated by the engine as the session changes. All reads are served
/// from this snapshot so the observer never blocks the session loop.
#[derive(Debug, Clone, Default)]
pub struct ObserverSnapshot {
    /// The latest graph, once the engine has published one.
    pub graph: Option<GraphSnapshot>,
    /// The latest layout frame.
    pub frame: LayoutFrame,
    /// Pass-through log, oldest first, capped at [`MAX_MESSAGES`].
    pub messages: Vec<PassthroughEntry>,
    /// Session counters.
    pub stats: SessionStats,
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast sender for renderer messages.
    pub tx: broadcast::Sender<ObserverBroadcast>,
    /// The current session snapshot.
    pub snapshot: Arc<RwLock<ObserverSnapshot>>,
    /// Queue of client messages into the session (present when a session
    /// is running).
    pub gestures: Option<mpsc::Sender<ClientMessage>>,
    /// Shared session control state (present when a session is running).
    pub control: Option<Arc<SessionControl>>,
}

impl AppState {
    /// Create a new application state with an empty snapshot and no
    /// session attached.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            snapshot: Arc::new(RwLock::new(ObserverSnapshot::default())),
            gestures: None,
            control: None,
        }
    }

    /// Create a new application state attached to a running session.
    pub fn with_session(
        gestures: mpsc::Sender<ClientMessage>,
        control: Arc<SessionControl>,
    ) -> Self {
        Self {
            gestures: Some(gestures),
            control: Some(control),
            ..Self::new()
        }
    }

    /// Build the message a newly connected client starts from.
    ///
    /// Returns `None` until the engine has published its first graph.
    pub async fn initial_snapshot(&self) -> Option<ObserverBroadcast> {
        let snap = self.snapshot.read().await;
        snap.graph.clone().map(|graph| ObserverBroadcast::Snapshot {
            graph,
            frame: snap.frame.clone(),
        })
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<ObserverBroadcast> {
        self.tx.subscribe()
    }

    /// Publish a message to all connected clients.
    ///
    /// Returns the number of receivers that received the message.
    /// Returns 0 if no clients are connected (this is not an error).
    pub fn broadcast(&self, message: ObserverBroadcast) -> usize {
        // send returns Err only when there are zero receivers,
        // which is normal when no WebSocket clients are connected.
        self.tx.send(message).unwrap_or(0)
    }

    /// Queue a client message for the session without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::SessionUnavailable`] if no session is
    /// attached, or [`ObserverError::QueueUnavailable`] if the queue is
    /// full or the session has ended.
    pub fn forward(&self, message: ClientMessage) -> Result<(), ObserverError> {
        let gestures = self
            .gestures
            .as_ref()
            .ok_or(ObserverError::SessionUnavailable)?;
        gestures
            .try_send(message)
            .map_err(|e| ObserverError::QueueUnavailable {
                reason: e.to_string(),
            })
    }

    /// Return the attached control state.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::SessionUnavailable`] if no session is
    /// attached.
    pub fn control(&self) -> Result<&Arc<SessionControl>, ObserverError> {
        self.control.as_ref().ok_or(ObserverError::SessionUnavailable)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
