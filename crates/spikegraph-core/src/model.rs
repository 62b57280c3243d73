//! The canonical graph model.
//!
//! [`GraphModel`] owns every node, edge, spike and activation of one
//! session and applies classified events to them. It is the only place
//! where identity, visibility and edge-retraction rules are enforced.
//!
//! # Rules
//!
//! - Node identity is the [`NodeKey`]: kind plus name (static mode) or
//!   wire id (live mode). Re-applying an event for an existing key mutates
//!   the existing entity; nodes are never removed.
//! - Edges are a set keyed by `(source, target, relation)`, so applying the
//!   same link twice never duplicates it. Both endpoints must be known
//!   nodes when an edge is created.
//! - `binds` edges are transient. Every activation update recomputes the
//!   set of bound spikes and diffs it against the edges materialized by the
//!   previous update, retracting and adding edges accordingly.
//! - An activation is visible iff one of its disjunctive maps binds at
//!   least one spike.
//! - At most one static state is active at a time. Activating a state
//!   deactivates the previous one; signal spikes only bump a counter on the
//!   signal node.
//! - A reference to a spike that is not yet known is dropped for that
//!   call. With deferred resolution enabled, the reference is remembered
//!   and materialized once the spike arrives.
//!
//! Each `apply_*` validates its input completely before touching any
//! state, so a rejected event leaves the model unchanged. A successful
//! call returns the [`GraphDelta`] that consumers use to synchronize
//! incrementally.

use std::collections::{BTreeMap, BTreeSet};

use spikegraph_types::{
    Activation, ActivationId, ActivationUpdate, Edge, EdgeRelation, GraphDelta, GraphSnapshot,
    Node, NodeKey, SessionId, SignalSpiked, Spike, SpikeId, SpikeUpdate, StateActivated,
    StaticLink, StaticRelation, UNBOUND_SPIKE,
};
use tracing::{debug, warn};

/// Errors that reject an event before it mutates the model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// A static link names an empty source or target.
    #[error("static `{relation:?}` link has an empty endpoint name")]
    EmptyName {
        /// Relation of the rejected link.
        relation: StaticRelation,
    },

    /// A static activate or spike event names an empty node.
    #[error("static `{event}` event has an empty name")]
    EmptyEventName {
        /// Wire type of the rejected event.
        event: &'static str,
    },

    /// An activation references a spike with a negative id other than
    /// the unbound sentinel.
    #[error("activation {activation} binds signal `{signal}` to invalid spike id {value}")]
    InvalidSpikeRef {
        /// The rejected activation.
        activation: ActivationId,
        /// The signal whose reference is invalid.
        signal: String,
        /// The offending wire value.
        value: i64,
    },

    /// An activation carries a negative or non-finite specificity.
    #[error("activation {activation} has invalid specificity {value}")]
    InvalidSpecificity {
        /// The rejected activation.
        activation: ActivationId,
        /// The offending value.
        value: f64,
    },
}

/// References to spikes that were unknown when they were applied.
#[derive(Debug, Clone, Default)]
struct DeferredReferences {
    /// Missing parent spike -> children waiting for it.
    children: BTreeMap<SpikeId, BTreeSet<SpikeId>>,
}

/// The graph model of one session.
#[derive(Debug, Clone)]
pub struct GraphModel {
    session_id: SessionId,
    nodes: BTreeMap<NodeKey, Node>,
    edges: BTreeSet<Edge>,
    spikes: BTreeMap<SpikeId, Spike>,
    activations: BTreeMap<ActivationId, Activation>,
    /// Spike ids each activation currently binds, known or not.
    wanted: BTreeMap<ActivationId, BTreeSet<SpikeId>>,
    /// Spike ids each activation has a materialized `binds` edge from.
    materialized: BTreeMap<ActivationId, BTreeSet<SpikeId>>,
    next_index: u64,
    next_weight: u64,
    /// The static state currently marked active.
    active_state: Option<NodeKey>,
    deferred: Option<DeferredReferences>,
}

impl Default for GraphModel {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphModel {
    /// Create an empty model that drops dangling references.
    pub fn new() -> Self {
        Self {
            session_id: SessionId::new(),
            nodes: BTreeMap::new(),
            edges: BTreeSet::new(),
            spikes: BTreeMap::new(),
            activations: BTreeMap::new(),
            wanted: BTreeMap::new(),
            materialized: BTreeMap::new(),
            next_index: 0,
            next_weight: 0,
            active_state: None,
            deferred: None,
        }
    }

    /// Create an empty model that resolves dangling references once the
    /// referenced spike arrives.
    pub fn with_deferred_resolution() -> Self {
        Self {
            deferred: Some(DeferredReferences::default()),
            ..Self::new()
        }
    }

    // -------------------------------------------------------------------
    // Static mode
    // -------------------------------------------------------------------

    /// Apply a static link descriptor.
    ///
    /// The relation fixes both endpoint roles. A name seen for the first
    /// time in a role gets the next creation index and weight; a repeated
    /// name reuses the existing node unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyName`] if either endpoint name is empty.
    pub fn apply_static_link(&mut self, link: &StaticLink) -> Result<GraphDelta, ModelError> {
        if link.source.is_empty() || link.target.is_empty() {
            return Err(ModelError::EmptyName {
                relation: link.relation,
            });
        }

        let mut delta = GraphDelta::default();
        let (source_kind, target_kind) = link.relation.roles();
        let (Some(source), Some(target)) = (
            NodeKey::named(source_kind, &link.source),
            NodeKey::named(target_kind, &link.target),
        ) else {
            // Static roles are always named kinds.
            return Ok(delta);
        };

        self.ensure_static_node(&source, &link.source, &mut delta);
        self.ensure_static_node(&target, &link.target, &mut delta);
        self.insert_edge(
            Edge::new(source, target, link.relation.edge_relation()),
            &mut delta,
        );
        Ok(delta)
    }

    fn ensure_static_node(&mut self, key: &NodeKey, name: &str, delta: &mut GraphDelta) {
        if self.nodes.contains_key(key) {
            return;
        }
        let weight = self.next_weight;
        self.next_weight = self.next_weight.saturating_add(1);
        self.create_node(key.clone(), name.to_owned(), Some(weight), true, delta);
    }

    /// Mark a static state as the active one.
    ///
    /// The previously active state is cleared first. A state that has no
    /// node yet leaves nothing active. Re-activating the active state is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyEventName`] if the state name is empty.
    pub fn apply_state_activation(
        &mut self,
        event: &StateActivated,
    ) -> Result<GraphDelta, ModelError> {
        if event.state.is_empty() {
            return Err(ModelError::EmptyEventName { event: "activate" });
        }

        let mut delta = GraphDelta::default();
        let key = NodeKey::State(event.state.clone());
        if self.active_state.as_ref() == Some(&key) {
            return Ok(delta);
        }

        let previous = self.active_state.take();
        if let Some(node) = previous.and_then(|previous| self.nodes.get_mut(&previous)) {
            node.active = false;
            delta.updated_nodes.push(node.clone());
        }

        if let Some(node) = self.nodes.get_mut(&key) {
            node.active = true;
            delta.updated_nodes.push(node.clone());
            self.active_state = Some(key);
            debug!(state = %event.state, "State activated");
        } else {
            warn!(state = %event.state, "Activated state unknown, nothing marked active");
        }
        Ok(delta)
    }

    /// Record a spike of a static signal.
    ///
    /// Unknown signals are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyEventName`] if the signal name is empty.
    pub fn apply_signal_spike(&mut self, event: &SignalSpiked) -> Result<GraphDelta, ModelError> {
        if event.signal.is_empty() {
            return Err(ModelError::EmptyEventName {
                event: "signal_spike",
            });
        }

        let mut delta = GraphDelta::default();
        let key = NodeKey::Signal(event.signal.clone());
        if let Some(node) = self.nodes.get_mut(&key) {
            node.spike_count = node.spike_count.saturating_add(1);
            delta.updated_nodes.push(node.clone());
        } else {
            warn!(signal = %event.signal, "Spiked signal unknown, ignored");
        }
        Ok(delta)
    }

    // -------------------------------------------------------------------
    // Live mode: spikes
    // -------------------------------------------------------------------

    /// Upsert a spike and link it to its known parents.
    ///
    /// Parent ids that are not yet known produce no edge. With deferred
    /// resolution they are remembered and linked when the parent arrives.
    ///
    /// # Errors
    ///
    /// Spike updates carry no values that can fail validation once
    /// classified; the `Result` keeps the `apply_*` family uniform.
    pub fn apply_spike(&mut self, update: SpikeUpdate) -> Result<GraphDelta, ModelError> {
        let mut delta = GraphDelta::default();
        let key = NodeKey::Spike(update.id);
        self.upsert_live_node(&key, &update.signal, true, &mut delta);

        for &parent in &update.parents {
            if parent == update.id {
                debug!(spike = %update.id, "Ignoring self-parent reference");
                continue;
            }
            if self.spikes.contains_key(&parent) {
                self.insert_edge(
                    Edge::new(NodeKey::Spike(parent), key.clone(), EdgeRelation::ParentOf),
                    &mut delta,
                );
            } else {
                warn!(spike = %update.id, parent = %parent, "Parent spike unknown, edge omitted");
                if let Some(deferred) = self.deferred.as_mut() {
                    deferred.children.entry(parent).or_default().insert(update.id);
                }
            }
        }

        let id = update.id;
        let is_new = !self.spikes.contains_key(&id);
        self.spikes.insert(
            id,
            Spike {
                id,
                signal: update.signal,
                parents: update.parents,
            },
        );

        if is_new && self.deferred.is_some() {
            self.resolve_deferred(id, &mut delta);
        }

        debug!(
            spike = %id,
            added_edges = delta.added_edges.len(),
            "Spike applied"
        );
        Ok(delta)
    }

    /// Materialize edges that were waiting for spike `id`.
    fn resolve_deferred(&mut self, id: SpikeId, delta: &mut GraphDelta) {
        let children = self
            .deferred
            .as_mut()
            .and_then(|deferred| deferred.children.remove(&id))
            .unwrap_or_default();
        for child in children {
            if self.spikes.contains_key(&child) {
                self.insert_edge(
                    Edge::new(NodeKey::Spike(id), NodeKey::Spike(child), EdgeRelation::ParentOf),
                    delta,
                );
            }
        }

        let waiting: Vec<ActivationId> = self
            .wanted
            .iter()
            .filter(|(_, spikes)| spikes.contains(&id))
            .map(|(activation, _)| *activation)
            .collect();
        for activation in waiting {
            self.insert_edge(
                Edge::new(
                    NodeKey::Spike(id),
                    NodeKey::Activation(activation),
                    EdgeRelation::Binds,
                ),
                delta,
            );
            self.materialized.entry(activation).or_default().insert(id);
        }
    }

    // -------------------------------------------------------------------
    // Live mode: activations
    // -------------------------------------------------------------------

    /// Upsert an activation and reconcile its `binds` edges.
    ///
    /// The spikes bound across all disjunctive maps are diffed against the
    /// edges materialized for this activation by its previous update: edges
    /// no longer bound are retracted, newly bound known spikes gain an
    /// edge. Visibility is recomputed and stored on both the entity and
    /// its node.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidSpecificity`] or
    /// [`ModelError::InvalidSpikeRef`] without mutating the model.
    pub fn apply_activation(&mut self, update: ActivationUpdate) -> Result<GraphDelta, ModelError> {
        let id = update.id;
        if !(update.specificity.is_finite() && update.specificity >= 0.0) {
            return Err(ModelError::InvalidSpecificity {
                activation: id,
                value: update.specificity,
            });
        }
        let spikes = resolve_spike_refs(id, update.spikes)?;

        let mut delta = GraphDelta::default();
        let visible = Activation::any_bound(&spikes);
        let key = NodeKey::Activation(id);
        self.upsert_live_node(&key, &update.state, visible, &mut delta);

        let wanted: BTreeSet<SpikeId> = spikes
            .iter()
            .flat_map(|conjunct| conjunct.values().filter_map(|spike| *spike))
            .collect();
        let desired: BTreeSet<SpikeId> = wanted
            .iter()
            .copied()
            .filter(|spike| self.spikes.contains_key(spike))
            .collect();
        for dangling in wanted.difference(&desired) {
            warn!(activation = %id, spike = %dangling, "Bound spike unknown, edge omitted");
        }

        let previous = self.materialized.remove(&id).unwrap_or_default();
        for spike in previous.difference(&desired) {
            let edge = Edge::new(NodeKey::Spike(*spike), key.clone(), EdgeRelation::Binds);
            if self.edges.remove(&edge) {
                delta.retracted_edges.push(edge);
            }
        }
        for spike in desired.difference(&previous) {
            self.insert_edge(
                Edge::new(NodeKey::Spike(*spike), key.clone(), EdgeRelation::Binds),
                &mut delta,
            );
        }

        self.materialized.insert(id, desired);
        self.wanted.insert(id, wanted);
        self.activations.insert(
            id,
            Activation {
                id,
                state: update.state,
                specificity: update.specificity,
                status: update.status,
                spikes,
                visible,
            },
        );

        debug!(
            activation = %id,
            visible,
            added_edges = delta.added_edges.len(),
            retracted_edges = delta.retracted_edges.len(),
            "Activation applied"
        );
        Ok(delta)
    }

    // -------------------------------------------------------------------
    // Shared helpers
    // -------------------------------------------------------------------

    fn create_node(
        &mut self,
        key: NodeKey,
        caption: String,
        weight: Option<u64>,
        visible: bool,
        delta: &mut GraphDelta,
    ) {
        let node = Node {
            key: key.clone(),
            caption,
            index: self.next_index,
            weight,
            visible,
            active: false,
            spike_count: 0,
        };
        self.next_index = self.next_index.saturating_add(1);
        debug!(node = %key, index = node.index, "Node created");
        delta.added_nodes.push(node.clone());
        self.nodes.insert(key, node);
    }

    /// Create a live node, or update caption and visibility of an existing
    /// one, recording the change in `delta`.
    fn upsert_live_node(
        &mut self,
        key: &NodeKey,
        caption: &str,
        visible: bool,
        delta: &mut GraphDelta,
    ) {
        if let Some(node) = self.nodes.get_mut(key) {
            if node.caption != caption || node.visible != visible {
                caption.clone_into(&mut node.caption);
                node.visible = visible;
                delta.updated_nodes.push(node.clone());
            }
        } else {
            self.create_node(key.clone(), caption.to_owned(), None, visible, delta);
        }
    }

    /// Insert an edge whose endpoints are both known; record it in
    /// `delta` if it was not present.
    fn insert_edge(&mut self, edge: Edge, delta: &mut GraphDelta) {
        if !(self.nodes.contains_key(&edge.source) && self.nodes.contains_key(&edge.target)) {
            warn!(source = %edge.source, target = %edge.target, "Edge endpoint unknown, edge omitted");
            return;
        }
        if self.edges.insert(edge.clone()) {
            delta.added_edges.push(edge);
        }
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Return the session this model belongs to.
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Look up a node by key.
    pub fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Iterate over all nodes in key order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Return the number of nodes, hidden ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate over all live edges.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Return the number of live edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the given edge is currently live.
    pub fn contains_edge(&self, edge: &Edge) -> bool {
        self.edges.contains(edge)
    }

    /// The static state currently marked active.
    pub const fn active_state(&self) -> Option<&NodeKey> {
        self.active_state.as_ref()
    }

    /// Look up a spike by id.
    pub fn spike(&self, id: SpikeId) -> Option<&Spike> {
        self.spikes.get(&id)
    }

    /// Look up an activation by id.
    pub fn activation(&self, id: ActivationId) -> Option<&Activation> {
        self.activations.get(&id)
    }

    /// Build a full snapshot with nodes in creation order.
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut nodes: Vec<Node> = self.nodes.values().cloned().collect();
        nodes.sort_by_key(|node| node.index);
        GraphSnapshot {
            session_id: self.session_id,
            nodes,
            edges: self.edges.iter().cloned().collect(),
            spikes: self.spikes.values().cloned().collect(),
            activations: self.activations.values().cloned().collect(),
        }
    }
}

/// Convert wire spike references into typed bindings.
///
/// [`UNBOUND_SPIKE`] becomes `None`; any other negative value rejects the
/// whole activation.
fn resolve_spike_refs(
    activation: ActivationId,
    maps: Vec<BTreeMap<String, i64>>,
) -> Result<Vec<BTreeMap<String, Option<SpikeId>>>, ModelError> {
    maps.into_iter()
        .map(|conjunct| {
            conjunct
                .into_iter()
                .map(|(signal, value)| {
                    if value == UNBOUND_SPIKE {
                        return Ok((signal, None));
                    }
                    match u64::try_from(value) {
                        Ok(raw) => Ok((signal, Some(SpikeId::new(raw)))),
                        Err(_) => Err(ModelError::InvalidSpikeRef {
                            activation,
                            signal,
                            value,
                        }),
                    }
                })
                .collect()
        })
        .collect()
}
