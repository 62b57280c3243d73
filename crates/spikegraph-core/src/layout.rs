//! Force-directed layout with user pins.
//!
//! [`LayoutSimulation`] owns the position, velocity and pin state of every
//! node it has been told about and advances them one [`tick`] at a time.
//! Four forces are accumulated into node velocities each tick, in order:
//!
//! 1. **Collision**: overlapping nodes are pushed apart. State and
//!    activation nodes use the major radius, all other kinds the minor one.
//! 2. **Repulsion**: every pair of nodes repels with a fixed strength,
//!    scaled by the inverse squared distance.
//! 3. **Centering**: all nodes are shifted so their centroid sits on the
//!    viewport center.
//! 4. **Links**: edge endpoints are pulled toward a rest distance
//!    proportional to the viewport height.
//!
//! Every force is scaled by `alpha`, the energy budget, which decays toward
//! `alpha_target` each tick. Once both fall below `alpha_min` and no node
//! is held by a drag, the simulation is settled and ticks integrate
//! nothing.
//!
//! # Pins
//!
//! `Free -> Dragging -> Pinned`. A dragged or pinned node is written to its
//! fixed position at the end of every tick, after forces have been
//! integrated, so physics can never move it. There is no transition back
//! to `Free`; a pinned node may be dragged again and is re-pinned where it
//! is dropped.
//!
//! The node and link tables are synchronized incrementally from each
//! [`GraphDelta`]; nodes are never removed, only edges.
//!
//! [`tick`]: LayoutSimulation::tick

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spikegraph_types::{
    Edge, EdgeGeometry, GraphDelta, LayoutFrame, NodeKey, NodePosition, PinState, Point,
};
use tracing::{debug, info};

use crate::config::{LayoutConfig, ViewportConfig};

/// Golden angle used to spread newly added nodes on a spiral.
const SPAWN_ANGLE: f64 = 2.399_963_229_728_653;

/// Radial step of the spawn spiral.
const SPAWN_RADIUS: f64 = 10.0;

/// Minimum squared distance used by the repulsion force.
const MIN_DISTANCE_SQUARED: f64 = 1.0;

/// Errors from layout operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    /// The gesture names a node the layout does not know.
    #[error("unknown node {key}")]
    UnknownNode {
        /// The requested key.
        key: NodeKey,
    },

    /// A move or release arrived for a node that is not being dragged.
    #[error("node {key} is not being dragged")]
    NotDragging {
        /// The requested key.
        key: NodeKey,
    },

    /// A drag moved a node to a non-finite coordinate.
    #[error("node {key} moved to non-finite position ({x}, {y})")]
    NonFinitePosition {
        /// The requested key.
        key: NodeKey,
        /// Requested x.
        x: f64,
        /// Requested y.
        y: f64,
    },

    /// The viewport is empty or not finite.
    #[error("invalid viewport {width}x{height}")]
    InvalidViewport {
        /// Requested width.
        width: f64,
        /// Requested height.
        height: f64,
    },
}

/// Simulation state of one node.
#[derive(Debug, Clone)]
struct Body {
    key: NodeKey,
    position: Point,
    velocity: Point,
    radius: f64,
    pin: PinState,
}

/// A link between two bodies, by index into the body table.
#[derive(Debug, Clone, Copy)]
struct Link {
    source: usize,
    target: usize,
}

/// The layout simulation of one session.
#[derive(Debug, Clone)]
pub struct LayoutSimulation {
    config: LayoutConfig,
    width: f64,
    height: f64,
    /// Bodies in insertion order; never shrinks, so indices are stable.
    bodies: Vec<Body>,
    index: BTreeMap<NodeKey, usize>,
    links: BTreeMap<Edge, Link>,
    alpha: f64,
    alpha_target: f64,
    alpha_decay: f64,
    tick: u64,
    settled: bool,
    rng: StdRng,
}

impl LayoutSimulation {
    /// Create an empty simulation for the given viewport.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidViewport`] if the viewport is not
    /// positive and finite.
    pub fn new(viewport: ViewportConfig, config: LayoutConfig) -> Result<Self, LayoutError> {
        check_viewport(viewport.width, viewport.height)?;
        let alpha_decay = config.effective_alpha_decay();
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            width: viewport.width,
            height: viewport.height,
            bodies: Vec::new(),
            index: BTreeMap::new(),
            links: BTreeMap::new(),
            alpha: 1.0,
            alpha_target: 0.0,
            alpha_decay,
            tick: 0,
            settled: false,
            rng,
        })
    }

    /// Change the viewport. The center and link rest distance follow it.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidViewport`] if the viewport is not
    /// positive and finite.
    pub fn resize(&mut self, width: f64, height: f64) -> Result<(), LayoutError> {
        check_viewport(width, height)?;
        self.width = width;
        self.height = height;
        self.reheat();
        Ok(())
    }

    // -------------------------------------------------------------------
    // Synchronization
    // -------------------------------------------------------------------

    /// Apply a model delta: add bodies for new nodes, add and remove
    /// links. Structural changes reheat the simulation.
    pub fn apply_delta(&mut self, delta: &GraphDelta) {
        for node in &delta.added_nodes {
            self.add_body(node.key.clone());
        }

        let mut changed = !delta.added_nodes.is_empty();
        for edge in &delta.retracted_edges {
            changed |= self.links.remove(edge).is_some();
        }
        for edge in &delta.added_edges {
            let (Some(&source), Some(&target)) =
                (self.index.get(&edge.source), self.index.get(&edge.target))
            else {
                debug!(source = %edge.source, target = %edge.target, "Link endpoint not laid out");
                continue;
            };
            if self.links.insert(edge.clone(), Link { source, target }).is_none() {
                changed = true;
            }
        }

        if changed {
            self.reheat();
        }
    }

    fn add_body(&mut self, key: NodeKey) {
        if self.index.contains_key(&key) {
            return;
        }
        let slot = self.bodies.len();
        let position = self.spawn_position(slot);
        let radius = if key.kind().is_major() {
            self.config.major_radius
        } else {
            self.config.minor_radius
        };
        self.index.insert(key.clone(), slot);
        self.bodies.push(Body {
            key,
            position,
            velocity: Point::default(),
            radius,
            pin: PinState::Free,
        });
    }

    /// Phyllotaxis placement around the viewport center.
    #[allow(clippy::cast_precision_loss)]
    fn spawn_position(&self, slot: usize) -> Point {
        let i = slot as f64;
        let radius = SPAWN_RADIUS * (0.5 + i).sqrt();
        let angle = i * SPAWN_ANGLE;
        let center = self.center();
        Point::new(
            radius.mul_add(angle.cos(), center.x),
            radius.mul_add(angle.sin(), center.y),
        )
    }

    fn reheat(&mut self) {
        if self.alpha < self.config.reheat_alpha {
            self.alpha = self.config.reheat_alpha;
        }
        self.settled = false;
    }

    // -------------------------------------------------------------------
    // Stepping
    // -------------------------------------------------------------------

    /// Advance the simulation by one tick and return the resulting frame.
    pub fn tick(&mut self) -> LayoutFrame {
        self.tick = self.tick.saturating_add(1);

        if self.alpha < self.config.alpha_min
            && self.alpha_target < self.config.alpha_min
            && !self.is_dragging()
        {
            if !self.settled {
                info!(tick = self.tick, "Layout settled");
            }
            self.settled = true;
            self.hold_pins();
            return self.frame();
        }
        self.settled = false;

        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;

        self.apply_collision();
        self.apply_repulsion();
        self.apply_centering();
        self.apply_links();
        self.integrate();

        self.frame()
    }

    fn apply_collision(&mut self) {
        let predicted: Vec<(Point, f64)> = self
            .bodies
            .iter()
            .map(|body| {
                (
                    Point::new(
                        body.position.x + body.velocity.x,
                        body.position.y + body.velocity.y,
                    ),
                    body.radius,
                )
            })
            .collect();

        let mut pushes = Vec::with_capacity(predicted.len());
        for (i, &(p, ri)) in predicted.iter().enumerate() {
            let mut push = Point::default();
            for (j, &(q, rj)) in predicted.iter().enumerate() {
                if i == j {
                    continue;
                }
                let reach = ri + rj;
                let (mut dx, mut dy) = (p.x - q.x, p.y - q.y);
                let mut l2 = dx.mul_add(dx, dy * dy);
                if l2 >= reach * reach {
                    continue;
                }
                if l2 == 0.0 {
                    dx = self.jiggle();
                    dy = self.jiggle();
                    l2 = dx.mul_add(dx, dy * dy);
                }
                let l = l2.sqrt();
                let overlap = (reach - l) / l;
                let share = (rj * rj) / ri.mul_add(ri, rj * rj);
                push.x += dx * overlap * share;
                push.y += dy * overlap * share;
            }
            pushes.push(push);
        }

        for (body, push) in self.bodies.iter_mut().zip(pushes) {
            body.velocity.x += push.x;
            body.velocity.y += push.y;
        }
    }

    fn apply_repulsion(&mut self) {
        let strength = -self.config.repulsion * self.alpha;
        let positions: Vec<Point> = self.bodies.iter().map(|body| body.position).collect();

        let mut forces = Vec::with_capacity(positions.len());
        for (i, p) in positions.iter().enumerate() {
            let mut force = Point::default();
            for (j, q) in positions.iter().enumerate() {
                if i == j {
                    continue;
                }
                let (mut dx, mut dy) = (q.x - p.x, q.y - p.y);
                if dx == 0.0 && dy == 0.0 {
                    dx = self.jiggle();
                    dy = self.jiggle();
                }
                let l2 = dx.mul_add(dx, dy * dy).max(MIN_DISTANCE_SQUARED);
                force.x += dx * strength / l2;
                force.y += dy * strength / l2;
            }
            forces.push(force);
        }

        for (body, force) in self.bodies.iter_mut().zip(forces) {
            body.velocity.x += force.x;
            body.velocity.y += force.y;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn apply_centering(&mut self) {
        if self.bodies.is_empty() {
            return;
        }
        let count = self.bodies.len() as f64;
        let (sum_x, sum_y) = self
            .bodies
            .iter()
            .fold((0.0, 0.0), |(x, y), body| (x + body.position.x, y + body.position.y));
        let center = self.center();
        let shift = Point::new(sum_x / count - center.x, sum_y / count - center.y);
        for body in &mut self.bodies {
            body.position.x -= shift.x;
            body.position.y -= shift.y;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn apply_links(&mut self) {
        if self.links.is_empty() {
            return;
        }
        let mut degree = vec![0_u32; self.bodies.len()];
        for link in self.links.values() {
            for end in [link.source, link.target] {
                if let Some(count) = degree.get_mut(end) {
                    *count = count.saturating_add(1);
                }
            }
        }

        let distance = self.height * self.config.link_distance_ratio;
        let links: Vec<Link> = self.links.values().copied().collect();
        for link in links {
            if link.source == link.target {
                continue;
            }
            let (Some(source), Some(target)) =
                (self.bodies.get(link.source), self.bodies.get(link.target))
            else {
                continue;
            };
            let source_degree = f64::from(degree.get(link.source).copied().unwrap_or(1).max(1));
            let target_degree = f64::from(degree.get(link.target).copied().unwrap_or(1).max(1));
            let strength = 1.0 / source_degree.min(target_degree);
            let bias = source_degree / (source_degree + target_degree);

            let mut dx = target.position.x + target.velocity.x
                - source.position.x
                - source.velocity.x;
            let mut dy = target.position.y + target.velocity.y
                - source.position.y
                - source.velocity.y;
            if dx == 0.0 && dy == 0.0 {
                dx = self.jiggle();
                dy = self.jiggle();
            }
            let len = dx.hypot(dy);
            let pull = (len - distance) / len * self.alpha * strength;
            let (fx, fy) = (dx * pull, dy * pull);

            if let Some(target) = self.bodies.get_mut(link.target) {
                target.velocity.x -= fx * bias;
                target.velocity.y -= fy * bias;
            }
            if let Some(source) = self.bodies.get_mut(link.source) {
                source.velocity.x += fx * (1.0 - bias);
                source.velocity.y += fy * (1.0 - bias);
            }
        }
    }

    fn integrate(&mut self) {
        let retain = 1.0 - self.config.velocity_decay;
        for body in &mut self.bodies {
            if let Some(fixed) = body.pin.fixed() {
                body.position = fixed;
                body.velocity = Point::default();
            } else {
                body.velocity.x *= retain;
                body.velocity.y *= retain;
                body.position.x += body.velocity.x;
                body.position.y += body.velocity.y;
            }
        }
    }

    fn hold_pins(&mut self) {
        for body in &mut self.bodies {
            if let Some(fixed) = body.pin.fixed() {
                body.position = fixed;
                body.velocity = Point::default();
            }
        }
    }

    /// Tiny random offset that separates coincident nodes.
    fn jiggle(&mut self) -> f64 {
        (self.rng.random::<f64>() - 0.5) * 1e-6
    }

    // -------------------------------------------------------------------
    // Drag gestures
    // -------------------------------------------------------------------

    /// Grab a node at its current position and restore full energy.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownNode`] if the node is not laid out.
    pub fn drag_start(&mut self, key: &NodeKey) -> Result<(), LayoutError> {
        let body = self.body_mut(key)?;
        body.pin = PinState::Dragging {
            x: body.position.x,
            y: body.position.y,
        };
        self.alpha = 1.0;
        self.settled = false;
        debug!(node = %key, "Drag started");
        Ok(())
    }

    /// Move a dragged node to `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownNode`], [`LayoutError::NotDragging`]
    /// if the node was not grabbed, or [`LayoutError::NonFinitePosition`].
    pub fn drag_move(&mut self, key: &NodeKey, x: f64, y: f64) -> Result<(), LayoutError> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(LayoutError::NonFinitePosition {
                key: key.clone(),
                x,
                y,
            });
        }
        let body = self.body_mut(key)?;
        if !matches!(body.pin, PinState::Dragging { .. }) {
            return Err(LayoutError::NotDragging { key: key.clone() });
        }
        body.pin = PinState::Dragging { x, y };
        body.position = Point::new(x, y);
        self.settled = false;
        Ok(())
    }

    /// Release a dragged node, pinning it where it was dropped.
    ///
    /// Energy then decays toward the settle floor, or toward zero once
    /// every node is pinned.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownNode`] or [`LayoutError::NotDragging`].
    pub fn drag_end(&mut self, key: &NodeKey) -> Result<(), LayoutError> {
        let body = self.body_mut(key)?;
        let PinState::Dragging { x, y } = body.pin else {
            return Err(LayoutError::NotDragging { key: key.clone() });
        };
        body.pin = PinState::Pinned { x, y };
        body.position = Point::new(x, y);

        let all_pinned = self
            .bodies
            .iter()
            .all(|body| matches!(body.pin, PinState::Pinned { .. }));
        self.alpha_target = if all_pinned {
            0.0
        } else {
            self.config.settle_floor
        };
        info!(node = %key, x, y, "Node pinned");
        Ok(())
    }

    fn body_mut(&mut self, key: &NodeKey) -> Result<&mut Body, LayoutError> {
        self.index
            .get(key)
            .and_then(|&slot| self.bodies.get_mut(slot))
            .ok_or_else(|| LayoutError::UnknownNode { key: key.clone() })
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Build the frame for the current state without stepping.
    pub fn frame(&self) -> LayoutFrame {
        let nodes = self
            .bodies
            .iter()
            .map(|body| NodePosition {
                key: body.key.clone(),
                position: body.position,
                radius: body.radius,
                pin: body.pin,
            })
            .collect();
        let edges = self
            .links
            .iter()
            .filter_map(|(edge, link)| {
                let from = self.bodies.get(link.source)?.position;
                let to = self.bodies.get(link.target)?.position;
                Some(EdgeGeometry::new(edge.clone(), from, to))
            })
            .collect();
        LayoutFrame {
            tick: self.tick,
            alpha: self.alpha,
            settled: self.settled,
            nodes,
            edges,
        }
    }

    /// Current position of a node.
    pub fn position(&self, key: &NodeKey) -> Option<Point> {
        self.index
            .get(key)
            .and_then(|&slot| self.bodies.get(slot))
            .map(|body| body.position)
    }

    /// Current pin state of a node.
    pub fn pin(&self, key: &NodeKey) -> Option<PinState> {
        self.index
            .get(key)
            .and_then(|&slot| self.bodies.get(slot))
            .map(|body| body.pin)
    }

    /// Current energy.
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Energy the simulation decays toward.
    pub const fn alpha_target(&self) -> f64 {
        self.alpha_target
    }

    /// Whether the last tick integrated nothing.
    pub const fn is_settled(&self) -> bool {
        self.settled
    }

    /// Number of laid-out nodes.
    pub fn node_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of laid-out links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Whether any node is currently held by a drag.
    pub fn is_dragging(&self) -> bool {
        self.bodies
            .iter()
            .any(|body| matches!(body.pin, PinState::Dragging { .. }))
    }

    /// Number of nodes pinned by the user.
    pub fn pinned_count(&self) -> usize {
        self.bodies
            .iter()
            .filter(|body| matches!(body.pin, PinState::Pinned { .. }))
            .count()
    }

    /// Ticks executed so far.
    pub const fn ticks(&self) -> u64 {
        self.tick
    }

    fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

fn check_viewport(width: f64, height: f64) -> Result<(), LayoutError> {
    if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
        Ok(())
    } else {
        Err(LayoutError::InvalidViewport { width, height })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use spikegraph_types::{ActivationId, EdgeRelation, Node, SpikeId};

    use super::*;

    fn simulation() -> LayoutSimulation {
        LayoutSimulation::new(ViewportConfig::default(), LayoutConfig::default()).unwrap()
    }

    fn node(key: NodeKey) -> Node {
        Node {
            key,
            caption: String::new(),
            index: 0,
            weight: None,
            visible: true,
            active: false,
            spike_count: 0,
        }
    }

    fn spike_key(id: u64) -> NodeKey {
        NodeKey::Spike(SpikeId::new(id))
    }

    fn activation_key(id: u64) -> NodeKey {
        NodeKey::Activation(ActivationId::new(id))
    }

    fn binds(spike: u64, activation: u64) -> Edge {
        Edge::new(spike_key(spike), activation_key(activation), EdgeRelation::Binds)
    }

    fn with_nodes(sim: &mut LayoutSimulation, keys: Vec<NodeKey>, edges: Vec<Edge>) {
        sim.apply_delta(&GraphDelta {
            added_nodes: keys.into_iter().map(node).collect(),
            added_edges: edges,
            ..GraphDelta::default()
        });
    }

    fn distance(a: Point, b: Point) -> f64 {
        (a.x - b.x).hypot(a.y - b.y)
    }

    #[test]
    fn rejects_empty_viewport() {
        let viewport = ViewportConfig {
            width: 0.0,
            height: 720.0,
        };
        let result = LayoutSimulation::new(viewport, LayoutConfig::default());
        assert!(matches!(result, Err(LayoutError::InvalidViewport { .. })));

        let mut sim = simulation();
        assert!(sim.resize(800.0, f64::NAN).is_err());
        assert!(sim.resize(800.0, 600.0).is_ok());
    }

    #[test]
    fn new_nodes_spawn_at_distinct_positions_near_center() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0), spike_key(1), activation_key(0)], vec![]);

        let frame = sim.frame();
        assert_eq!(frame.nodes.len(), 3);
        let center = Point::new(640.0, 360.0);
        for (i, a) in frame.nodes.iter().enumerate() {
            assert!(distance(a.position, center) < 30.0);
            for b in frame.nodes.iter().skip(i + 1) {
                assert!(distance(a.position, b.position) > 1.0);
            }
        }
    }

    #[test]
    fn radius_depends_on_kind() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0), activation_key(0)], vec![]);
        let frame = sim.frame();
        let radius = |key: &NodeKey| {
            frame
                .nodes
                .iter()
                .find(|position| &position.key == key)
                .unwrap()
                .radius
        };
        assert!((radius(&activation_key(0)) - 70.0).abs() < f64::EPSILON);
        assert!((radius(&spike_key(0)) - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unlinked_nodes_spread_apart() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0), spike_key(1)], vec![]);
        let before = distance(
            sim.position(&spike_key(0)).unwrap(),
            sim.position(&spike_key(1)).unwrap(),
        );
        for _ in 0..50 {
            sim.tick();
        }
        let after = distance(
            sim.position(&spike_key(0)).unwrap(),
            sim.position(&spike_key(1)).unwrap(),
        );
        assert!(after > before);
        // Collision keeps the minor radii from overlapping.
        assert!(after > 90.0);
    }

    #[test]
    fn centroid_stays_on_viewport_center() {
        let mut sim = simulation();
        with_nodes(
            &mut sim,
            vec![spike_key(0), spike_key(1), activation_key(0)],
            vec![binds(0, 0)],
        );
        for _ in 0..20 {
            sim.tick();
        }
        let frame = sim.frame();
        #[allow(clippy::cast_precision_loss)]
        let count = frame.nodes.len() as f64;
        let cx = frame.nodes.iter().map(|n| n.position.x).sum::<f64>() / count;
        let cy = frame.nodes.iter().map(|n| n.position.y).sum::<f64>() / count;
        // Centering runs before the last integration step, so allow drift
        // of one step's velocity.
        assert!((cx - 640.0).abs() < 25.0);
        assert!((cy - 360.0).abs() < 25.0);
    }

    #[test]
    fn linked_nodes_settle_near_rest_distance() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0), activation_key(0)], vec![binds(0, 0)]);
        for _ in 0..300 {
            sim.tick();
        }
        let gap = distance(
            sim.position(&spike_key(0)).unwrap(),
            sim.position(&activation_key(0)).unwrap(),
        );
        // Rest distance is 720 / 6 = 120, collision reach is 70 + 50.
        assert!(gap > 100.0, "gap {gap}");
        assert!(gap < 200.0, "gap {gap}");
    }

    #[test]
    fn energy_decays_until_settled() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0)], vec![]);
        let first = sim.tick();
        assert!(first.alpha < 1.0);
        assert!(!first.settled);

        let mut last = first;
        for _ in 0..400 {
            last = sim.tick();
        }
        assert!(last.settled);
        assert!(sim.is_settled());
        assert!(last.alpha < LayoutConfig::default().alpha_min);
    }

    #[test]
    fn settled_layout_does_not_move() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0), spike_key(1)], vec![]);
        for _ in 0..400 {
            sim.tick();
        }
        let before = sim.frame();
        let after = sim.tick();
        assert!(after.settled);
        assert_eq!(before.nodes, after.nodes);
    }

    #[test]
    fn added_nodes_reheat_a_settled_layout() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0)], vec![]);
        for _ in 0..400 {
            sim.tick();
        }
        assert!(sim.is_settled());

        with_nodes(&mut sim, vec![spike_key(1)], vec![]);
        assert!(sim.alpha() >= LayoutConfig::default().reheat_alpha);
        assert!(!sim.tick().settled);
    }

    #[test]
    fn retracted_edges_leave_the_frame() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0), activation_key(0)], vec![binds(0, 0)]);
        assert_eq!(sim.tick().edges.len(), 1);

        sim.apply_delta(&GraphDelta {
            retracted_edges: vec![binds(0, 0)],
            ..GraphDelta::default()
        });
        assert_eq!(sim.link_count(), 0);
        assert!(sim.tick().edges.is_empty());
        assert_eq!(sim.node_count(), 2);
    }

    #[test]
    fn edge_to_unknown_node_is_skipped() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0)], vec![binds(0, 9)]);
        assert_eq!(sim.link_count(), 0);
    }

    #[test]
    fn pinned_node_keeps_its_position_every_tick() {
        let mut sim = simulation();
        with_nodes(
            &mut sim,
            vec![spike_key(0), spike_key(1), activation_key(0)],
            vec![binds(0, 0), binds(1, 0)],
        );
        let key = activation_key(0);
        sim.drag_start(&key).unwrap();
        sim.drag_move(&key, 100.0, 50.0).unwrap();
        sim.drag_end(&key).unwrap();
        assert_eq!(sim.pin(&key), Some(PinState::Pinned { x: 100.0, y: 50.0 }));

        for _ in 0..200 {
            let frame = sim.tick();
            let pinned = frame.nodes.iter().find(|n| n.key == key).unwrap();
            assert_eq!(pinned.position, Point::new(100.0, 50.0));
        }
        // A new neighbour reheats the layout without moving the pin.
        with_nodes(&mut sim, vec![spike_key(2)], vec![]);
        sim.tick();
        assert_eq!(sim.position(&key), Some(Point::new(100.0, 50.0)));
    }

    #[test]
    fn dragged_node_follows_pointer_during_ticks() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0), spike_key(1)], vec![]);
        sim.drag_start(&spike_key(0)).unwrap();
        sim.drag_move(&spike_key(0), 10.0, 20.0).unwrap();
        sim.tick();
        assert_eq!(sim.position(&spike_key(0)), Some(Point::new(10.0, 20.0)));
        assert_eq!(
            sim.pin(&spike_key(0)),
            Some(PinState::Dragging { x: 10.0, y: 20.0 })
        );
    }

    #[test]
    fn drag_start_restores_full_energy() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0), spike_key(1)], vec![]);
        for _ in 0..400 {
            sim.tick();
        }
        sim.drag_start(&spike_key(0)).unwrap();
        assert!((sim.alpha() - 1.0).abs() < f64::EPSILON);
        assert!(!sim.tick().settled);
    }

    #[test]
    fn held_node_keeps_the_layout_awake() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0), spike_key(1)], vec![]);
        let key = spike_key(0);
        sim.drag_start(&key).unwrap();
        for _ in 0..400 {
            sim.tick();
        }
        assert!(sim.alpha() < LayoutConfig::default().alpha_min);
        assert!(!sim.is_settled());

        sim.drag_move(&key, 5.0, 5.0).unwrap();
        let frame = sim.tick();
        assert!(!frame.settled);
        let held = frame.nodes.iter().find(|n| n.key == key).unwrap();
        assert_eq!(held.position, Point::new(5.0, 5.0));

        sim.drag_end(&key).unwrap();
        assert!(!sim.is_dragging());
    }

    #[test]
    fn resize_moves_the_center_and_reheats() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0), spike_key(1)], vec![]);
        for _ in 0..400 {
            sim.tick();
        }
        assert!(sim.is_settled());

        sim.resize(400.0, 300.0).unwrap();
        assert!(!sim.is_settled());
        for _ in 0..20 {
            sim.tick();
        }
        let frame = sim.frame();
        #[allow(clippy::cast_precision_loss)]
        let count = frame.nodes.len() as f64;
        let cx = frame.nodes.iter().map(|n| n.position.x).sum::<f64>() / count;
        assert!((cx - 200.0).abs() < 25.0, "cx {cx}");
    }

    #[test]
    fn frame_edges_carry_control_points() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0), activation_key(0)], vec![binds(0, 0)]);
        let frame = sim.tick();
        let geometry = frame.edges.first().unwrap();
        assert_eq!(
            *geometry,
            EdgeGeometry::new(binds(0, 0), geometry.from, geometry.to)
        );
    }

    #[test]
    fn drag_end_decays_toward_floor_while_nodes_are_free() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0), spike_key(1)], vec![]);
        sim.drag_start(&spike_key(0)).unwrap();
        sim.drag_end(&spike_key(0)).unwrap();
        assert!((sim.alpha_target() - 0.1).abs() < f64::EPSILON);

        for _ in 0..1000 {
            sim.tick();
        }
        assert!(!sim.is_settled());
        assert!((sim.alpha() - 0.1).abs() < 0.01);
    }

    #[test]
    fn pinning_every_node_lets_the_layout_settle() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0)], vec![]);
        sim.drag_start(&spike_key(0)).unwrap();
        sim.drag_end(&spike_key(0)).unwrap();
        assert!(sim.alpha_target().abs() < f64::EPSILON);

        for _ in 0..400 {
            sim.tick();
        }
        assert!(sim.is_settled());
    }

    #[test]
    fn pinned_node_can_be_dragged_again() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0)], vec![]);
        let key = spike_key(0);
        sim.drag_start(&key).unwrap();
        sim.drag_move(&key, 1.0, 1.0).unwrap();
        sim.drag_end(&key).unwrap();

        sim.drag_start(&key).unwrap();
        sim.drag_move(&key, 5.0, 6.0).unwrap();
        sim.drag_end(&key).unwrap();
        assert_eq!(sim.pin(&key), Some(PinState::Pinned { x: 5.0, y: 6.0 }));
    }

    #[test]
    fn out_of_order_gestures_are_rejected() {
        let mut sim = simulation();
        with_nodes(&mut sim, vec![spike_key(0)], vec![]);

        assert_eq!(
            sim.drag_move(&spike_key(0), 1.0, 1.0),
            Err(LayoutError::NotDragging { key: spike_key(0) })
        );
        assert_eq!(
            sim.drag_end(&spike_key(0)),
            Err(LayoutError::NotDragging { key: spike_key(0) })
        );
        assert_eq!(
            sim.drag_start(&spike_key(7)),
            Err(LayoutError::UnknownNode { key: spike_key(7) })
        );

        sim.drag_start(&spike_key(0)).unwrap();
        assert!(matches!(
            sim.drag_move(&spike_key(0), f64::INFINITY, 0.0),
            Err(LayoutError::NonFinitePosition { .. })
        ));
        assert!(matches!(
            sim.pin(&spike_key(0)),
            Some(PinState::Dragging { .. })
        ));
    }

    #[test]
    fn same_seed_gives_same_layout() {
        let run = || {
            let mut sim = simulation();
            with_nodes(
                &mut sim,
                vec![spike_key(0), spike_key(1), activation_key(0)],
                vec![binds(0, 0)],
            );
            for _ in 0..30 {
                sim.tick();
            }
            sim.frame()
        };
        assert_eq!(run(), run());
    }
}
