//! Shared type definitions for the spikegraph visualizer.
//!
//! This crate is the single source of truth for the types that cross a
//! crate or process boundary: inbound wire messages from the reasoning
//! system, the canonical graph entities, and the renderer-facing delta,
//! snapshot and layout frame types. Renderer-facing types flow to
//! `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Typed wire ids for spikes and activations, plus session ids
//! - [`enums`] -- Node kinds, edge relations, activation status
//! - [`messages`] -- Inbound wire messages and renderer client messages
//! - [`structs`] -- Nodes, edges, entities, deltas, snapshots, layout frames

pub mod enums;
pub mod ids;
pub mod messages;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{ActivationStatus, EdgeRelation, NodeKind, PassthroughDirection, StaticRelation};
pub use ids::{ActivationId, SessionId, SpikeId};
pub use messages::{
    ActivationUpdate, ClientMessage, PassthroughText, SignalSpiked, SpikeUpdate, StateActivated,
    StaticLink, UNBOUND_SPIKE,
};
pub use structs::{
    Activation, ClassifierStats, Edge, EdgeGeometry, GraphDelta, GraphSnapshot, LayoutFrame,
    Node, NodeKey, NodePosition, PassthroughEntry, PinState, Point, SessionStats, Spike,
};
