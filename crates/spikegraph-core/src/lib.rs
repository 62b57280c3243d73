//! Event classification, graph model, force layout and session loop for
//! the spikegraph visualizer.
//!
//! Data flows in one direction: raw inbound messages are routed by the
//! [`EventClassifier`], applied to the [`GraphModel`], and every resulting
//! [`GraphDelta`] synchronizes the [`LayoutSimulation`]. A [`Session`] owns
//! all three; the [`runner`] drives a session from ordered queues.
//!
//! # Modules
//!
//! - [`classifier`] -- Routes inbound JSON messages to typed channels.
//! - [`config`] -- Configuration loading from `spikegraph-config.yaml` into
//!   strongly-typed structs.
//! - [`control`] -- Shared pause, stop and tick-speed state.
//! - [`layout`] -- Force-directed layout with drag pins.
//! - [`model`] -- The canonical node, edge, spike and activation model.
//! - [`runner`] -- Async session loop over inbound and gesture queues.
//! - [`session`] -- Single owner of classifier, model and layout.
//!
//! [`EventClassifier`]: classifier::EventClassifier
//! [`GraphModel`]: model::GraphModel
//! [`GraphDelta`]: spikegraph_types::GraphDelta
//! [`LayoutSimulation`]: layout::LayoutSimulation
//! [`Session`]: session::Session

pub mod classifier;
pub mod config;
pub mod control;
pub mod layout;
pub mod model;
pub mod runner;
pub mod session;
