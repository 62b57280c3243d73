//! Wire messages exchanged with the reasoning system and the renderer.
//!
//! Inbound messages from the reasoning system are discriminated by a
//! `type` field. The classifier in `spikegraph-core` reads that field and
//! deserializes the remainder into one of the structs here; the `type`
//! field itself is ignored by these structs.
//!
//! [`ClientMessage`] travels the other way: gestures and typed input sent
//! by a renderer client.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ActivationStatus, StaticRelation};
use crate::ids::{ActivationId, SpikeId};
use crate::structs::NodeKey;

/// Wire value marking a signal reference that no spike is bound to yet.
pub const UNBOUND_SPIKE: i64 = -1;

/// `{type: "spike", id, signal, parents}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SpikeUpdate {
    /// Identifies a unique spike.
    pub id: SpikeId,
    /// Signal represented by the spike, used as caption.
    pub signal: String,
    /// Immediate parent spikes that caused this spike.
    pub parents: Vec<SpikeId>,
}

/// `{type: "activation", id, state, specificity, status, spikes}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActivationUpdate {
    /// Identifies a unique activation.
    pub id: ActivationId,
    /// State represented by the activation, used as caption.
    pub state: String,
    /// Relevance weight of the state.
    pub specificity: f64,
    /// Execution status.
    pub status: ActivationStatus,
    /// Disjunctive signal-to-spike reference maps. A value of
    /// [`UNBOUND_SPIKE`] means no spike is bound for that signal yet.
    #[ts(type = "Array<Record<string, number>>")]
    pub spikes: Vec<BTreeMap<String, i64>>,
}

/// `{type: "output" | "input", text}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PassthroughText {
    /// The message text.
    pub text: String,
}

/// `{source, target, type: "changes" | "triggers" | "emits" | "sets"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StaticLink {
    /// Name of the source node in its role.
    pub source: String,
    /// Name of the target node in its role.
    pub target: String,
    /// The link relation.
    #[serde(rename = "type")]
    pub relation: StaticRelation,
}

/// `{type: "activate", state}`: a static-mode state became active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StateActivated {
    /// Name of the activated state.
    pub state: String,
}

/// `{type: "signal_spike", signal}`: a static-mode signal spiked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SignalSpiked {
    /// Name of the signal.
    pub signal: String,
}

/// A message sent by a renderer client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ClientMessage {
    /// The user grabbed a node.
    DragStart {
        /// The grabbed node.
        node: NodeKey,
    },
    /// The user moved a grabbed node to `(x, y)`.
    DragMove {
        /// The dragged node.
        node: NodeKey,
        /// New x coordinate.
        x: f64,
        /// New y coordinate.
        y: f64,
    },
    /// The user released a node; it stays pinned where it was dropped.
    DragEnd {
        /// The released node.
        node: NodeKey,
    },
    /// The renderer viewport changed size.
    Resize {
        /// New viewport width.
        width: f64,
        /// New viewport height.
        height: f64,
    },
    /// Text typed by the user.
    Input {
        /// The typed text.
        text: String,
    },
}
