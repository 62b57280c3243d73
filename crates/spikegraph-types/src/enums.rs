//! Enumeration types for the spikegraph visualizer.
//!
//! Covers node kinds for both graph modes, edge relations, activation
//! status, the four static link relations, and pass-through direction.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

/// The kind of a graph node.
///
/// `State`, `Signal` and `Property` belong to the static link-graph mode;
/// `Spike` and `Activation` belong to the live mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NodeKind {
    /// A state (behavior) in the static graph.
    State,
    /// A signal in the static graph.
    Signal,
    /// A property in the static graph.
    Property,
    /// A live spike.
    Spike,
    /// A live activation.
    Activation,
}

impl NodeKind {
    /// Whether this kind is drawn as a "major" node with the larger
    /// collision radius.
    pub const fn is_major(self) -> bool {
        matches!(self, Self::State | Self::Activation)
    }
}

// ---------------------------------------------------------------------------
// Edge relations
// ---------------------------------------------------------------------------

/// The relation carried by a directed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EdgeRelation {
    /// State changes a property.
    Changes,
    /// Signal triggers a state.
    Triggers,
    /// State emits a signal.
    Emits,
    /// Property sets a signal.
    Sets,
    /// Parent spike caused a child spike.
    ParentOf,
    /// A spike is bound into an activation.
    Binds,
}

/// The four relations a static link descriptor may carry.
///
/// Each relation fixes the roles of its two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum StaticRelation {
    /// State -> Property.
    Changes,
    /// Signal -> State.
    Triggers,
    /// State -> Signal.
    Emits,
    /// Property -> Signal.
    Sets,
}

impl StaticRelation {
    /// Return the `(source, target)` node kinds this relation connects.
    pub const fn roles(self) -> (NodeKind, NodeKind) {
        match self {
            Self::Changes => (NodeKind::State, NodeKind::Property),
            Self::Triggers => (NodeKind::Signal, NodeKind::State),
            Self::Emits => (NodeKind::State, NodeKind::Signal),
            Self::Sets => (NodeKind::Property, NodeKind::Signal),
        }
    }

    /// Return the edge relation materialized for this link.
    pub const fn edge_relation(self) -> EdgeRelation {
        match self {
            Self::Changes => EdgeRelation::Changes,
            Self::Triggers => EdgeRelation::Triggers,
            Self::Emits => EdgeRelation::Emits,
            Self::Sets => EdgeRelation::Sets,
        }
    }

    /// Parse the wire discriminant (`"changes"`, `"triggers"`, ...).
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "changes" => Some(Self::Changes),
            "triggers" => Some(Self::Triggers),
            "emits" => Some(Self::Emits),
            "sets" => Some(Self::Sets),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Activation status
// ---------------------------------------------------------------------------

/// Execution status of an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActivationStatus {
    /// Waiting for additional spikes.
    Wait,
    /// Waiting for permission to run.
    Ready,
    /// Executing.
    Run,
}

// ---------------------------------------------------------------------------
// Pass-through
// ---------------------------------------------------------------------------

/// Direction of a pass-through text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum PassthroughDirection {
    /// Text produced by the reasoning system for the user.
    Output,
    /// Text typed by the user for the reasoning system.
    Input,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_roles_match_relation_table() {
        assert_eq!(
            StaticRelation::Changes.roles(),
            (NodeKind::State, NodeKind::Property)
        );
        assert_eq!(
            StaticRelation::Triggers.roles(),
            (NodeKind::Signal, NodeKind::State)
        );
        assert_eq!(
            StaticRelation::Emits.roles(),
            (NodeKind::State, NodeKind::Signal)
        );
        assert_eq!(
            StaticRelation::Sets.roles(),
            (NodeKind::Property, NodeKind::Signal)
        );
    }

    #[test]
    fn only_states_and_activations_are_major() {
        assert!(NodeKind::State.is_major());
        assert!(NodeKind::Activation.is_major());
        assert!(!NodeKind::Signal.is_major());
        assert!(!NodeKind::Property.is_major());
        assert!(!NodeKind::Spike.is_major());
    }

    #[test]
    fn status_uses_lowercase_wire_names() {
        let parsed: Result<ActivationStatus, _> = serde_json::from_str("\"ready\"");
        assert_eq!(parsed.ok(), Some(ActivationStatus::Ready));
        assert!(serde_json::from_str::<ActivationStatus>("\"done\"").is_err());
    }

    #[test]
    fn static_relation_from_wire() {
        assert_eq!(StaticRelation::from_wire("emits"), Some(StaticRelation::Emits));
        assert_eq!(StaticRelation::from_wire("spike"), None);
    }
}
