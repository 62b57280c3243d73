//! One visualization session.
//!
//! A [`Session`] is the single owner of the [`EventClassifier`], the
//! [`GraphModel`] and the [`LayoutSimulation`]. Every mutation goes through
//! it, one call at a time, so the three never disagree: an inbound message
//! is classified, applied to the model and synchronized into the layout
//! before the call returns.
//!
//! Pass-through messages bypass the graph and land in a bounded log that
//! keeps the most recent entries in arrival order.

use std::collections::VecDeque;

use chrono::Utc;
use spikegraph_types::{
    ClientMessage, GraphDelta, GraphSnapshot, LayoutFrame, PassthroughDirection,
    PassthroughEntry, SessionStats, StaticLink,
};
use tracing::{debug, warn};

use crate::classifier::{EventClassifier, InboundEvent};
use crate::config::SpikegraphConfig;
use crate::layout::{LayoutError, LayoutSimulation};
use crate::model::{GraphModel, ModelError};

/// Errors that prevent a session from being created.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The layout rejected its configuration.
    #[error("layout error: {source}")]
    Layout {
        /// The underlying layout error.
        #[from]
        source: LayoutError,
    },
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The message was applied to the model. The delta may be empty when
    /// only entity attributes changed.
    Applied(GraphDelta),
    /// The message was recorded in the pass-through log.
    Passthrough(PassthroughEntry),
    /// The message was dropped by the classifier or the model.
    Rejected,
}

/// Owner of all state of one visualization session.
#[derive(Debug)]
pub struct Session {
    classifier: EventClassifier,
    model: GraphModel,
    layout: LayoutSimulation,
    passthrough: VecDeque<PassthroughEntry>,
    passthrough_capacity: usize,
    rejected: u64,
}

impl Session {
    /// Create an empty session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Layout`] if the viewport is invalid.
    pub fn new(config: &SpikegraphConfig) -> Result<Self, SessionError> {
        let model = if config.session.resolve_deferred_references {
            GraphModel::with_deferred_resolution()
        } else {
            GraphModel::new()
        };
        let layout = LayoutSimulation::new(config.viewport, config.layout.clone())?;
        Ok(Self {
            classifier: EventClassifier::new(),
            model,
            layout,
            passthrough: VecDeque::with_capacity(config.session.passthrough_capacity),
            passthrough_capacity: config.session.passthrough_capacity,
            rejected: 0,
        })
    }

    /// Classify and apply one raw inbound message.
    pub fn ingest(&mut self, raw: &str) -> IngestOutcome {
        match self.classifier.dispatch(raw) {
            Some(event) => self.apply_event(event),
            None => IngestOutcome::Rejected,
        }
    }

    /// Apply one classified event.
    pub fn apply_event(&mut self, event: InboundEvent) -> IngestOutcome {
        let result = match event {
            InboundEvent::Spike(update) => self.model.apply_spike(update),
            InboundEvent::Activation(update) => self.model.apply_activation(update),
            InboundEvent::StaticLink(link) => self.model.apply_static_link(&link),
            InboundEvent::StateActivated(event) => self.model.apply_state_activation(&event),
            InboundEvent::SignalSpiked(event) => self.model.apply_signal_spike(&event),
            InboundEvent::Passthrough { direction, text } => {
                return IngestOutcome::Passthrough(self.record_passthrough(direction, text));
            }
        };
        match result {
            Ok(delta) => {
                self.layout.apply_delta(&delta);
                IngestOutcome::Applied(delta)
            }
            Err(err) => {
                self.reject(&err);
                IngestOutcome::Rejected
            }
        }
    }

    /// Apply a batch of static links, typically loaded at startup.
    ///
    /// Links are applied one by one in order; rejected links are logged
    /// and skipped. Returns the combined delta of all applied links.
    pub fn apply_static_links<I>(&mut self, links: I) -> GraphDelta
    where
        I: IntoIterator<Item = StaticLink>,
    {
        let mut combined = GraphDelta::default();
        for link in links {
            match self.model.apply_static_link(&link) {
                Ok(delta) => {
                    self.layout.apply_delta(&delta);
                    combined.added_nodes.extend(delta.added_nodes);
                    combined.updated_nodes.extend(delta.updated_nodes);
                    combined.added_edges.extend(delta.added_edges);
                    combined.retracted_edges.extend(delta.retracted_edges);
                }
                Err(err) => self.reject(&err),
            }
        }
        combined
    }

    /// Apply a message from a renderer client.
    ///
    /// Drag and resize gestures go to the layout. Typed input is recorded
    /// in the pass-through log and returned.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] for gestures on unknown nodes, out of
    /// order, or resizing to an invalid viewport.
    pub fn gesture(
        &mut self,
        message: ClientMessage,
    ) -> Result<Option<PassthroughEntry>, LayoutError> {
        match message {
            ClientMessage::DragStart { node } => self.layout.drag_start(&node)?,
            ClientMessage::DragMove { node, x, y } => self.layout.drag_move(&node, x, y)?,
            ClientMessage::DragEnd { node } => self.layout.drag_end(&node)?,
            ClientMessage::Resize { width, height } => self.layout.resize(width, height)?,
            ClientMessage::Input { text } => {
                return Ok(Some(
                    self.record_passthrough(PassthroughDirection::Input, text),
                ));
            }
        }
        Ok(None)
    }

    /// Advance the layout by one tick.
    pub fn tick(&mut self) -> LayoutFrame {
        self.layout.tick()
    }

    fn record_passthrough(&mut self, direction: PassthroughDirection, text: String) -> PassthroughEntry {
        let entry = PassthroughEntry {
            direction,
            text,
            received_at: Utc::now(),
        };
        debug!(direction = ?entry.direction, "Pass-through message recorded");
        if self.passthrough_capacity > 0 {
            while self.passthrough.len() >= self.passthrough_capacity {
                self.passthrough.pop_front();
            }
            self.passthrough.push_back(entry.clone());
        }
        entry
    }

    fn reject(&mut self, err: &ModelError) {
        self.rejected = self.rejected.saturating_add(1);
        warn!(error = %err, "Event rejected by model");
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Full model snapshot.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.model.snapshot()
    }

    /// Current layout frame, without stepping.
    pub fn frame(&self) -> LayoutFrame {
        self.layout.frame()
    }

    /// The most recent pass-through entries, oldest first, at most `limit`.
    pub fn passthrough(&self, limit: usize) -> Vec<PassthroughEntry> {
        let skip = self.passthrough.len().saturating_sub(limit);
        self.passthrough.iter().skip(skip).cloned().collect()
    }

    /// Session counters.
    pub fn stats(&self) -> SessionStats {
        let count = |n: usize| u64::try_from(n).unwrap_or(u64::MAX);
        SessionStats {
            classifier: self.classifier.stats(),
            rejected: self.rejected,
            nodes: count(self.model.node_count()),
            visible_nodes: count(self.model.nodes().filter(|node| node.visible).count()),
            edges: count(self.model.edge_count()),
            pinned_nodes: count(self.layout.pinned_count()),
            ticks: self.layout.ticks(),
        }
    }

    /// The graph model.
    pub const fn model(&self) -> &GraphModel {
        &self.model
    }

    /// The layout simulation.
    pub const fn layout(&self) -> &LayoutSimulation {
        &self.layout
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use spikegraph_types::{ActivationId, NodeKey, PinState, Point, SpikeId, StaticRelation};

    use super::*;
    use crate::config::SessionConfig;

    fn session() -> Session {
        Session::new(&SpikegraphConfig::default()).unwrap()
    }

    fn spike_key(id: u64) -> NodeKey {
        NodeKey::Spike(SpikeId::new(id))
    }

    #[test]
    fn ingest_feeds_model_and_layout() {
        let mut session = session();
        let outcome =
            session.ingest(r#"{"type": "spike", "id": 0, "signal": "a", "parents": []}"#);
        assert!(matches!(outcome, IngestOutcome::Applied(ref delta) if delta.added_nodes.len() == 1));

        session.ingest(
            r#"{"type": "activation", "id": 0, "state": "s", "specificity": 0.2,
                "status": "ready", "spikes": [{"a": 0}]}"#,
        );
        assert_eq!(session.model().node_count(), 2);
        assert_eq!(session.layout().node_count(), 2);
        assert_eq!(session.layout().link_count(), 1);
        assert_eq!(session.frame().edges.len(), 1);
    }

    #[test]
    fn unbinding_retracts_layout_link() {
        let mut session = session();
        session.ingest(r#"{"type": "spike", "id": 0, "signal": "a", "parents": []}"#);
        session.ingest(
            r#"{"type": "activation", "id": 0, "state": "s", "specificity": 0.2,
                "status": "ready", "spikes": [{"a": 0}]}"#,
        );
        session.ingest(
            r#"{"type": "activation", "id": 0, "state": "s", "specificity": 0.2,
                "status": "ready", "spikes": [{"a": -1}]}"#,
        );
        assert_eq!(session.layout().link_count(), 0);
        assert!(!session
            .model()
            .activation(ActivationId::new(0))
            .unwrap()
            .visible);
    }

    #[test]
    fn malformed_and_invalid_messages_are_rejected() {
        let mut session = session();
        assert_eq!(session.ingest(r#"{"type": "nope"}"#), IngestOutcome::Rejected);
        assert_eq!(
            session.ingest(
                r#"{"type": "activation", "id": 0, "state": "s", "specificity": -1.0,
                    "status": "ready", "spikes": []}"#
            ),
            IngestOutcome::Rejected
        );
        let stats = session.stats();
        assert_eq!(stats.classifier.unknown, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.nodes, 0);
    }

    #[test]
    fn passthrough_log_is_bounded_and_ordered() {
        let mut config = SpikegraphConfig::default();
        config.session = SessionConfig {
            passthrough_capacity: 2,
            ..SessionConfig::default()
        };
        let mut session = Session::new(&config).unwrap();
        session.ingest(r#"{"type": "output", "text": "one"}"#);
        session.ingest(r#"{"type": "output", "text": "two"}"#);
        session
            .gesture(ClientMessage::Input {
                text: String::from("three"),
            })
            .unwrap();

        let texts: Vec<String> = session.passthrough(10).into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec![String::from("two"), String::from("three")]);
        assert_eq!(session.passthrough(1).len(), 1);
        assert_eq!(session.model().node_count(), 0);
    }

    #[test]
    fn gestures_pin_nodes() {
        let mut session = session();
        session.ingest(r#"{"type": "spike", "id": 3, "signal": "a", "parents": []}"#);
        session
            .gesture(ClientMessage::DragStart { node: spike_key(3) })
            .unwrap();
        session
            .gesture(ClientMessage::DragMove {
                node: spike_key(3),
                x: 12.0,
                y: 34.0,
            })
            .unwrap();
        session
            .gesture(ClientMessage::DragEnd { node: spike_key(3) })
            .unwrap();

        let frame = session.tick();
        let pinned = frame.nodes.first().unwrap();
        assert_eq!(pinned.position, Point::new(12.0, 34.0));
        assert_eq!(pinned.pin, PinState::Pinned { x: 12.0, y: 34.0 });
        assert_eq!(session.stats().pinned_nodes, 1);

        let err = session
            .gesture(ClientMessage::DragEnd { node: spike_key(9) })
            .unwrap_err();
        assert_eq!(err, LayoutError::UnknownNode { key: spike_key(9) });
    }

    #[test]
    fn resize_gesture_reaches_the_layout() {
        let mut session = session();
        session.ingest(r#"{"type": "spike", "id": 0, "signal": "a", "parents": []}"#);
        for _ in 0..400 {
            session.tick();
        }
        assert!(session.layout().is_settled());

        session
            .gesture(ClientMessage::Resize {
                width: 200.0,
                height: 100.0,
            })
            .unwrap();
        assert!(!session.layout().is_settled());
        for _ in 0..5 {
            session.tick();
        }
        let position = session.frame().nodes.first().unwrap().position;
        assert!((position.x - 100.0).abs() < 1e-6, "x {}", position.x);
        assert!((position.y - 50.0).abs() < 1e-6, "y {}", position.y);

        let err = session
            .gesture(ClientMessage::Resize {
                width: -1.0,
                height: 100.0,
            })
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidViewport { .. }));
    }

    #[test]
    fn static_activate_and_signal_spike_update_nodes() {
        let mut session = session();
        session.ingest(r#"{"source": "nlp", "target": "is-question", "type": "emits"}"#);

        let outcome = session.ingest(r#"{"type": "activate", "state": "nlp"}"#);
        assert!(matches!(
            outcome,
            IngestOutcome::Applied(ref delta)
                if delta.updated_nodes.first().is_some_and(|node| node.active)
        ));
        session.ingest(r#"{"type": "signal_spike", "signal": "is-question"}"#);
        let signal = NodeKey::Signal(String::from("is-question"));
        assert_eq!(session.model().node(&signal).unwrap().spike_count, 1);

        assert_eq!(
            session.ingest(r#"{"type": "activate", "state": ""}"#),
            IngestOutcome::Rejected
        );
        let stats = session.stats();
        assert_eq!(stats.classifier.static_events, 3);
        assert_eq!(stats.rejected, 1);
        assert_eq!(session.layout().node_count(), 2);
    }

    #[test]
    fn static_links_load_in_bulk() {
        let mut session = session();
        let links = vec![
            StaticLink {
                source: String::from("nlp"),
                target: String::from("is-question"),
                relation: StaticRelation::Emits,
            },
            StaticLink {
                source: String::new(),
                target: String::from("x"),
                relation: StaticRelation::Sets,
            },
            StaticLink {
                source: String::from("nlp"),
                target: String::from("is-question"),
                relation: StaticRelation::Emits,
            },
        ];
        let delta = session.apply_static_links(links);
        assert_eq!(delta.added_nodes.len(), 2);
        assert_eq!(delta.added_edges.len(), 1);
        assert_eq!(session.stats().rejected, 1);
        assert_eq!(session.layout().node_count(), 2);
    }

    #[test]
    fn ticks_are_counted() {
        let mut session = session();
        session.tick();
        session.tick();
        assert_eq!(session.stats().ticks, 2);
    }
}
