//! Session callback that updates the Observer API state.
//!
//! Every change is broadcast to connected `WebSocket` clients, then
//! mirrored into the in-memory [`ObserverSnapshot`] served by the REST
//! endpoints. The full graph is rebuilt at most once per tick: model
//! changes only mark it dirty, unless the session is paused and no tick
//! will follow.
//!
//! [`ObserverSnapshot`]: spikegraph_observer::ObserverSnapshot

use std::sync::Arc;

use spikegraph_core::runner::SessionCallback;
use spikegraph_core::session::Session;
use spikegraph_observer::state::{AppState, ObserverBroadcast, MAX_MESSAGES};
use spikegraph_types::{GraphDelta, LayoutFrame, PassthroughEntry};
use tracing::debug;

/// Callback that bridges the session loop to the Observer API.
pub struct ObserverCallback {
    state: Arc<AppState>,
    /// Set when a snapshot write was skipped; the next successful write
    /// refreshes everything.
    stale: bool,
    /// Set when the model changed since the graph was last mirrored.
    graph_dirty: bool,
}

impl ObserverCallback {
    /// Create a new observer callback backed by the given app state.
    pub const fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            stale: false,
            graph_dirty: false,
        }
    }

    /// Mirror the whole session into the snapshot.
    ///
    /// Called once at startup and whenever an earlier write was skipped.
    pub fn publish(&mut self, session: &Session) {
        // Use try_write to avoid blocking the session loop. If a REST
        // handler holds the read lock, skip this update and catch up on
        // the next one.
        if let Ok(mut snap) = self.state.snapshot.try_write() {
            snap.graph = Some(session.snapshot());
            snap.frame = session.frame();
            snap.messages = session.passthrough(MAX_MESSAGES);
            snap.stats = session.stats();
            self.stale = false;
            self.graph_dirty = false;
        } else {
            self.stale = true;
        }
    }

    fn is_paused(&self) -> bool {
        self.state
            .control
            .as_ref()
            .is_some_and(|control| control.is_paused())
    }

    /// Whether the last mirrored frame is settled at the same positions.
    fn repeats_settled_frame(&self, frame: &LayoutFrame) -> bool {
        frame.settled
            && self.state.snapshot.try_read().is_ok_and(|snap| {
                snap.frame.settled
                    && snap.frame.nodes == frame.nodes
                    && snap.frame.edges == frame.edges
            })
    }
}

impl SessionCallback for ObserverCallback {
    fn on_model_change(&mut self, delta: &GraphDelta, session: &Session) {
        let receivers = self.state.broadcast(ObserverBroadcast::ModelChanged {
            delta: delta.clone(),
        });
        debug!(
            added_nodes = delta.added_nodes.len(),
            added_edges = delta.added_edges.len(),
            receivers,
            "Model change broadcast sent"
        );

        self.graph_dirty = true;
        if self.stale || self.is_paused() {
            self.publish(session);
        } else if let Ok(mut snap) = self.state.snapshot.try_write() {
            snap.stats = session.stats();
        } else {
            self.stale = true;
        }
    }

    fn on_passthrough(&mut self, entry: &PassthroughEntry, session: &Session) {
        self.state.broadcast(ObserverBroadcast::Passthrough {
            entry: entry.clone(),
        });

        if self.stale {
            self.publish(session);
        } else if let Ok(mut snap) = self.state.snapshot.try_write() {
            snap.messages.push(entry.clone());
            if snap.messages.len() > MAX_MESSAGES {
                let drain_count = snap.messages.len().saturating_sub(MAX_MESSAGES);
                snap.messages.drain(..drain_count);
            }
            snap.stats = session.stats();
        } else {
            self.stale = true;
        }
    }

    fn on_tick(&mut self, frame: &LayoutFrame, session: &Session) {
        if !self.repeats_settled_frame(frame) {
            self.state.broadcast(ObserverBroadcast::Frame {
                frame: frame.clone(),
            });
        }

        if self.stale {
            self.publish(session);
        } else if let Ok(mut snap) = self.state.snapshot.try_write() {
            if self.graph_dirty {
                snap.graph = Some(session.snapshot());
                self.graph_dirty = false;
            }
            snap.frame = frame.clone();
            snap.stats = session.stats();
        } else {
            self.stale = true;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use spikegraph_core::config::{SessionConfig, SpikegraphConfig};
    use spikegraph_core::control::SessionControl;
    use spikegraph_core::session::IngestOutcome;
    use spikegraph_types::{ClientMessage, NodeKey, Point, SpikeId};

    use super::*;

    fn setup() -> (Session, Arc<AppState>, ObserverCallback) {
        let session = Session::new(&SpikegraphConfig::default()).unwrap();
        let state = Arc::new(AppState::new());
        let callback = ObserverCallback::new(Arc::clone(&state));
        (session, state, callback)
    }

    #[tokio::test]
    async fn model_change_updates_graph_and_broadcasts() {
        let (mut session, state, mut callback) = setup();
        let mut rx = state.subscribe();

        let outcome =
            session.ingest(r#"{"type": "spike", "id": 3, "signal": "a", "parents": []}"#);
        assert!(matches!(outcome, IngestOutcome::Applied(_)));
        if let IngestOutcome::Applied(delta) = outcome {
            callback.on_model_change(&delta, &session);
        }

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, ObserverBroadcast::ModelChanged { .. }));
        {
            let snap = state.snapshot.read().await;
            assert!(snap.graph.is_none());
            assert_eq!(snap.stats.nodes, 1);
        }

        let frame = session.tick();
        callback.on_tick(&frame, &session);
        let snap = state.snapshot.read().await;
        assert_eq!(snap.graph.as_ref().unwrap().nodes.len(), 1);
        assert!(!callback.graph_dirty);
    }

    #[tokio::test]
    async fn burst_of_changes_rebuilds_graph_once_per_tick() {
        let (mut session, state, mut callback) = setup();
        for id in 0..50 {
            let raw = format!(r#"{{"type": "spike", "id": {id}, "signal": "s", "parents": []}}"#);
            if let IngestOutcome::Applied(delta) = session.ingest(&raw) {
                callback.on_model_change(&delta, &session);
            }
        }
        assert!(callback.graph_dirty);
        assert!(state.snapshot.read().await.graph.is_none());

        let frame = session.tick();
        callback.on_tick(&frame, &session);
        let snap = state.snapshot.read().await;
        assert_eq!(snap.graph.as_ref().unwrap().nodes.len(), 50);
    }

    #[tokio::test]
    async fn paused_session_mirrors_graph_immediately() {
        let (tx, _rx) = tokio::sync::mpsc::channel(4);
        let control = Arc::new(SessionControl::new(&SessionConfig::default()));
        control.pause();
        let state = Arc::new(AppState::with_session(tx, Arc::clone(&control)));
        let mut callback = ObserverCallback::new(Arc::clone(&state));
        let mut session = Session::new(&SpikegraphConfig::default()).unwrap();

        if let IngestOutcome::Applied(delta) =
            session.ingest(r#"{"type": "spike", "id": 0, "signal": "a", "parents": []}"#)
        {
            callback.on_model_change(&delta, &session);
        }
        let snap = state.snapshot.read().await;
        assert_eq!(snap.graph.as_ref().unwrap().nodes.len(), 1);
    }

    #[tokio::test]
    async fn passthrough_is_appended() {
        let (mut session, state, mut callback) = setup();

        if let IngestOutcome::Passthrough(entry) =
            session.ingest(r#"{"type": "output", "text": "hello"}"#)
        {
            callback.on_passthrough(&entry, &session);
        }

        let snap = state.snapshot.read().await;
        assert_eq!(snap.messages.len(), 1);
        assert_eq!(snap.messages.first().unwrap().text, "hello");
    }

    #[tokio::test]
    async fn skipped_write_is_caught_up() {
        let (mut session, state, mut callback) = setup();
        session.ingest(r#"{"type": "spike", "id": 0, "signal": "a", "parents": []}"#);

        {
            let _reader = state.snapshot.read().await;
            let frame = session.tick();
            callback.on_tick(&frame, &session);
        }
        assert!(callback.stale);

        let frame = session.tick();
        callback.on_tick(&frame, &session);

        assert!(!callback.stale);
        let snap = state.snapshot.read().await;
        assert_eq!(snap.frame.tick, 2);
        assert!(snap.graph.is_some());
    }

    #[tokio::test]
    async fn settled_frames_are_broadcast_once() {
        let (mut session, state, mut callback) = setup();
        let mut rx = state.subscribe();

        // An empty layout settles as soon as alpha decays; run it out.
        let mut frame = session.tick();
        while !frame.settled {
            frame = session.tick();
        }
        callback.on_tick(&frame, &session);
        let frame = session.tick();
        callback.on_tick(&frame, &session);

        assert!(matches!(rx.recv().await.unwrap(), ObserverBroadcast::Frame { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn settled_frames_at_new_positions_are_broadcast() {
        let (mut session, state, mut callback) = setup();
        session.ingest(r#"{"type": "spike", "id": 0, "signal": "a", "parents": []}"#);
        let mut rx = state.subscribe();

        let mut first = session.frame();
        first.settled = true;
        let mut second = first.clone();
        if let Some(node) = second.nodes.first_mut() {
            node.position = Point::new(5.0, 5.0);
        }
        callback.on_tick(&first, &session);
        callback.on_tick(&second, &session);

        assert!(matches!(rx.recv().await.unwrap(), ObserverBroadcast::Frame { .. }));
        let received = rx.recv().await.unwrap();
        assert!(matches!(
            received,
            ObserverBroadcast::Frame { ref frame }
                if frame.nodes.first().map(|n| n.position) == Some(Point::new(5.0, 5.0))
        ));
    }

    #[tokio::test]
    async fn drag_after_settling_is_broadcast() {
        let (mut session, state, mut callback) = setup();
        session.ingest(r#"{"type": "spike", "id": 0, "signal": "a", "parents": []}"#);
        session.ingest(r#"{"type": "spike", "id": 1, "signal": "b", "parents": []}"#);
        let key = NodeKey::Spike(SpikeId::new(0));

        session
            .gesture(ClientMessage::DragStart { node: key.clone() })
            .unwrap();
        for _ in 0..400 {
            let frame = session.tick();
            callback.on_tick(&frame, &session);
        }

        let mut rx = state.subscribe();
        session
            .gesture(ClientMessage::DragMove {
                node: key.clone(),
                x: 5.0,
                y: 5.0,
            })
            .unwrap();
        let frame = session.tick();
        callback.on_tick(&frame, &session);

        let received = rx.try_recv().unwrap();
        assert!(matches!(
            received,
            ObserverBroadcast::Frame { ref frame }
                if !frame.settled
                    && frame.nodes.iter().any(|n| n.key == key && n.position == Point::new(5.0, 5.0))
        ));
    }
}
