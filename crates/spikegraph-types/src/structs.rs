//! Graph entity structs and renderer-facing snapshots.
//!
//! Covers node identity ([`NodeKey`]), the canonical [`Node`], [`Edge`],
//! [`Spike`] and [`Activation`] entities, the incremental [`GraphDelta`]
//! emitted after each applied event, and the per-tick [`LayoutFrame`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ActivationStatus, EdgeRelation, NodeKind, PassthroughDirection};
use crate::ids::{ActivationId, SessionId, SpikeId};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity key of a node: its kind plus its name or numeric id.
///
/// Static-mode nodes are keyed by name within their role, so a state and
/// a signal may share a name. Live-mode nodes are keyed by wire id, so a
/// spike and an activation may share a number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NodeKey {
    /// A static-mode state.
    State(String),
    /// A static-mode signal.
    Signal(String),
    /// A static-mode property.
    Property(String),
    /// A live spike.
    Spike(SpikeId),
    /// A live activation.
    Activation(ActivationId),
}

impl NodeKey {
    /// Build a static-mode key for `name` in the given role.
    ///
    /// Returns `None` for the live kinds, which are keyed by id.
    pub fn named(kind: NodeKind, name: &str) -> Option<Self> {
        match kind {
            NodeKind::State => Some(Self::State(name.to_owned())),
            NodeKind::Signal => Some(Self::Signal(name.to_owned())),
            NodeKind::Property => Some(Self::Property(name.to_owned())),
            NodeKind::Spike | NodeKind::Activation => None,
        }
    }

    /// Return the node kind.
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::State(_) => NodeKind::State,
            Self::Signal(_) => NodeKind::Signal,
            Self::Property(_) => NodeKind::Property,
            Self::Spike(_) => NodeKind::Spike,
            Self::Activation(_) => NodeKind::Activation,
        }
    }
}

impl core::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::State(name) => write!(f, "state:{name}"),
            Self::Signal(name) => write!(f, "signal:{name}"),
            Self::Property(name) => write!(f, "property:{name}"),
            Self::Spike(id) => write!(f, "spike:{id}"),
            Self::Activation(id) => write!(f, "activation:{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes and edges
// ---------------------------------------------------------------------------

/// A node of the visualized graph.
///
/// Nodes are never removed during a session. Hidden nodes stay in the
/// model with `visible == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Node {
    /// Identity key.
    pub key: NodeKey,
    /// Display caption (name, signal or state).
    pub caption: String,
    /// Creation order, monotonic across the session.
    #[ts(type = "number")]
    pub index: u64,
    /// Static-mode link weight, monotonic across all roles. `None` for
    /// live nodes.
    #[ts(type = "number | null")]
    pub weight: Option<u64>,
    /// Whether the renderer should draw this node.
    pub visible: bool,
    /// Static mode: this state is the one most recently activated. At
    /// most one node is active at a time.
    #[serde(default)]
    pub active: bool,
    /// Static mode: how often this signal has spiked. The renderer
    /// flashes the node whenever the count grows.
    #[serde(default)]
    #[ts(type = "number")]
    pub spike_count: u64,
}

/// A directed edge. Identity is the full `(source, target, relation)`
/// triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Edge {
    /// Source node.
    pub source: NodeKey,
    /// Target node.
    pub target: NodeKey,
    /// Relation carried by the edge.
    pub relation: EdgeRelation,
}

impl Edge {
    /// Construct an edge.
    pub const fn new(source: NodeKey, target: NodeKey, relation: EdgeRelation) -> Self {
        Self {
            source,
            target,
            relation,
        }
    }
}

// ---------------------------------------------------------------------------
// Live entities
// ---------------------------------------------------------------------------

/// A spike: one occurrence of a signal with its causal ancestry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Spike {
    /// Spike id.
    pub id: SpikeId,
    /// Signal name.
    pub signal: String,
    /// Parent spike ids in arrival order.
    pub parents: Vec<SpikeId>,
}

/// An activation: a candidate behavior instance and its spike bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Activation {
    /// Activation id.
    pub id: ActivationId,
    /// State name.
    pub state: String,
    /// Non-negative relevance weight.
    pub specificity: f64,
    /// Execution status.
    pub status: ActivationStatus,
    /// Disjunctive signal-to-spike maps; `None` means not yet bound.
    pub spikes: Vec<BTreeMap<String, Option<SpikeId>>>,
    /// True iff at least one map binds at least one spike.
    pub visible: bool,
}

impl Activation {
    /// Compute visibility from a set of disjunctive maps.
    pub fn any_bound(spikes: &[BTreeMap<String, Option<SpikeId>>]) -> bool {
        spikes
            .iter()
            .any(|conjunct| conjunct.values().any(Option::is_some))
    }
}

// ---------------------------------------------------------------------------
// Model deltas and snapshots
// ---------------------------------------------------------------------------

/// The "model changed" notification emitted after each applied event.
///
/// Consumers synchronize incrementally from the delta instead of
/// rebuilding from the full snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GraphDelta {
    /// Nodes created by this event.
    pub added_nodes: Vec<Node>,
    /// Existing nodes whose caption or visibility changed.
    pub updated_nodes: Vec<Node>,
    /// Edges materialized by this event.
    pub added_edges: Vec<Edge>,
    /// Edges retracted by this event.
    pub retracted_edges: Vec<Edge>,
}

impl GraphDelta {
    /// Whether the delta carries no structural or visual change.
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.updated_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.retracted_edges.is_empty()
    }
}

/// Full snapshot of the graph model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GraphSnapshot {
    /// Session the snapshot belongs to.
    pub session_id: SessionId,
    /// All nodes in creation order.
    pub nodes: Vec<Node>,
    /// All live edges.
    pub edges: Vec<Edge>,
    /// All spikes by id.
    pub spikes: Vec<Spike>,
    /// All activations by id.
    pub activations: Vec<Activation>,
}

// ---------------------------------------------------------------------------
// Layout output
// ---------------------------------------------------------------------------

/// A point in canvas coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Construct a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pin descriptor of a laid-out node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "state", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum PinState {
    /// Moved by the physics.
    #[default]
    Free,
    /// Held under the pointer at `(x, y)`.
    Dragging {
        /// Pointer x.
        x: f64,
        /// Pointer y.
        y: f64,
    },
    /// Fixed at `(x, y)` for the rest of the session.
    Pinned {
        /// Pinned x.
        x: f64,
        /// Pinned y.
        y: f64,
    },
}

impl PinState {
    /// The fixed position, if the node is not free.
    pub const fn fixed(self) -> Option<Point> {
        match self {
            Self::Free => None,
            Self::Dragging { x, y } | Self::Pinned { x, y } => Some(Point::new(x, y)),
        }
    }
}

/// Position of one node after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NodePosition {
    /// Node key.
    pub key: NodeKey,
    /// Position.
    pub position: Point,
    /// Collision radius.
    pub radius: f64,
    /// Pin descriptor.
    pub pin: PinState,
}

/// Endpoints and connector curve of one edge after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EdgeGeometry {
    /// The edge.
    pub edge: Edge,
    /// Source position.
    pub from: Point,
    /// Target position.
    pub to: Point,
    /// First cubic Bezier control point.
    pub c1: Point,
    /// Second cubic Bezier control point.
    pub c2: Point,
}

impl EdgeGeometry {
    /// Build the geometry of `edge` between two positions, computing the
    /// connector's control points in whole canvas units.
    pub fn new(edge: Edge, from: Point, to: Point) -> Self {
        let c1 = Point::new(
            round_half_up((from.x + to.x * 2.0) / 3.0),
            round_half_up((from.y * 3.0 + to.y) / 4.0),
        );
        let c2 = Point::new(
            round_half_up((from.x * 2.0 + to.x) / 3.0),
            round_half_up((from.y + to.y * 3.0) / 4.0),
        );
        Self {
            edge,
            from,
            to,
            c1,
            c2,
        }
    }
}

/// Round to the nearest integer, halves toward positive infinity.
///
/// Matches `Math.round`: -2.5 becomes -2, where `f64::round` gives -3.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Layout output of one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LayoutFrame {
    /// Tick counter.
    #[ts(type = "number")]
    pub tick: u64,
    /// Current kinetic energy budget.
    pub alpha: f64,
    /// True when the energy fell below the stop threshold and no force
    /// was integrated this tick.
    pub settled: bool,
    /// Node positions.
    pub nodes: Vec<NodePosition>,
    /// Edge endpoints.
    pub edges: Vec<EdgeGeometry>,
}

// ---------------------------------------------------------------------------
// Pass-through log and counters
// ---------------------------------------------------------------------------

/// One pass-through text message with its receive time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PassthroughEntry {
    /// Direction of the message.
    pub direction: PassthroughDirection,
    /// Message text.
    pub text: String,
    /// When the session received it.
    pub received_at: DateTime<Utc>,
}

/// Per-channel message counters kept by the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ClassifierStats {
    /// Messages routed to the spike channel.
    #[ts(type = "number")]
    pub spikes: u64,
    /// Messages routed to the activation channel.
    #[ts(type = "number")]
    pub activations: u64,
    /// Messages routed to the pass-through channel.
    #[ts(type = "number")]
    pub passthrough: u64,
    /// Messages routed to the static-link channel.
    #[ts(type = "number")]
    pub static_links: u64,
    /// Static-mode state activations and signal spikes.
    #[ts(type = "number")]
    pub static_events: u64,
    /// Messages dropped for an unknown `type`.
    #[ts(type = "number")]
    pub unknown: u64,
    /// Messages dropped as malformed.
    #[ts(type = "number")]
    pub malformed: u64,
}

/// Counters reported by a running session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionStats {
    /// Classifier routing counters.
    pub classifier: ClassifierStats,
    /// Events the model rejected during validation.
    #[ts(type = "number")]
    pub rejected: u64,
    /// Nodes in the model, hidden ones included.
    #[ts(type = "number")]
    pub nodes: u64,
    /// Nodes the renderer should draw.
    #[ts(type = "number")]
    pub visible_nodes: u64,
    /// Live edges.
    #[ts(type = "number")]
    pub edges: u64,
    /// Nodes pinned by the user.
    #[ts(type = "number")]
    pub pinned_nodes: u64,
    /// Layout ticks executed.
    #[ts(type = "number")]
    pub ticks: u64,
}
