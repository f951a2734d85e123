//! Spring relaxation with Barnes-Hut approximate repulsion.
//!
//! Each `step()` advances the simulation by one discrete time step in
//! four ordered phases:
//!
//! 1. **Decay** — damp every node's running velocity and zero the
//!    per-step force accumulators.
//! 2. **Edge relaxation** — every edge pulls (or pushes) its endpoints
//!    toward the configured rest length, damped by endpoint degree.
//! 3. **Repulsion** — every unlocked node accumulates inverse-distance
//!    repulsion from the force objects the quadtree yields for its
//!    position.
//! 4. **Integration** — velocities absorb the step's forces and the
//!    displacement, speed-capped per axis, is committed to the position
//!    store under one exclusive guard.
//!
//! Phases read the graph through stamped snapshots, so a thread
//! structurally mutating the graph mid-step costs at worst a bounded
//! number of snapshot retries, never a torn iteration.

use std::sync::Arc;

use dashmap::DashMap;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::graph::{EdgeEndpoints, GraphView, NodeId};
use crate::layout::iterative::{IterativeLayout, LayoutError};
use crate::layout::model::LayoutModel;
use crate::spatial::{BarnesHutTree, Rect};

/// Nodes never move more than this many units per axis in one step.
const MAX_SPEED: f64 = 5.0;

/// Substitute for an exactly zero edge length, so the spring force
/// formula never divides by zero.
const ZERO_LENGTH_EPSILON: f64 = 0.0001;

/// Snapshot attempts before giving up on a mutation-stable listing.
const SNAPSHOT_RETRIES: usize = 8;

/// Desired rest length for an edge, given its endpoints.
pub type EdgeLengthFn = Box<dyn Fn(EdgeEndpoints) -> f64 + Send + Sync>;

/// Tunable parameters for the spring layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringConfig {
    /// Base of the degree-damping exponent applied to spring forces; a
    /// value in (0, 1) makes edges through high-degree nodes pull more
    /// weakly.
    pub stretch: f64,
    /// Repulsion cutoff radius in layout units. Force objects farther
    /// away contribute nothing.
    pub repulsion_range: u32,
    /// Scale applied to every spring force.
    pub force_multiplier: f64,
    /// Barnes-Hut cell-size-to-distance threshold used when the
    /// repulsion tree is built at attach time.
    pub theta: f64,
    /// Seed for the jitter randomness that separates coincident nodes.
    /// None seeds from OS entropy; fixing it makes runs reproducible.
    pub jitter_seed: Option<u64>,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            stretch: 0.70,
            repulsion_range: 100,
            force_multiplier: 1.0 / 3.0,
            theta: 0.5,
            jitter_seed: None,
        }
    }
}

/// Per-node force accumulator.
///
/// Created lazily the first time a force touches the node and kept for
/// the life of the layout; the velocity carries over between steps as an
/// exponentially decaying integral of past net force, while the edge and
/// repulsion fields hold only the current step's contributions.
#[derive(Debug, Clone, Copy, Default)]
struct ForceState {
    edgedx: f64,
    edgedy: f64,
    repulsiondx: f64,
    repulsiondy: f64,
    /// Movement speed, x.
    dx: f64,
    /// Movement speed, y.
    dy: f64,
}

struct Attached {
    model: Arc<LayoutModel>,
    graph: Arc<dyn GraphView>,
    /// Built once at attach time from the position snapshot and reused
    /// for every step; repulsion queries therefore see attach-time
    /// positions, not in-progress ones.
    tree: BarnesHutTree,
}

/// Incremental spring-force layout engine.
///
/// Create one, optionally configure it, attach it to a [`LayoutModel`]
/// and a [`GraphView`], then drive it with repeated [`SpringLayout::step`]
/// calls until the caller is satisfied with the layout.
pub struct SpringLayout {
    stretch: f64,
    repulsion_range_sq: f64,
    force_multiplier: f64,
    theta: f64,
    edge_length: EdgeLengthFn,
    forces: DashMap<NodeId, ForceState>,
    rng: SmallRng,
    attached: Option<Attached>,
}

impl SpringLayout {
    /// Create an engine with default parameters and the default constant
    /// rest length of 30 for every edge.
    pub fn new() -> Self {
        Self::with_config(SpringConfig::default())
    }

    /// Create an engine from explicit parameters.
    pub fn with_config(config: SpringConfig) -> Self {
        let rng = match config.jitter_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Self {
            stretch: config.stretch,
            repulsion_range_sq: (config.repulsion_range as f64) * (config.repulsion_range as f64),
            force_multiplier: config.force_multiplier,
            theta: config.theta,
            edge_length: Box::new(|_| 30.0),
            forces: DashMap::new(),
            rng,
            attached: None,
        }
    }

    /// Replace the edge rest-length function.
    pub fn set_edge_length<F>(&mut self, length: F)
    where
        F: Fn(EdgeEndpoints) -> f64 + Send + Sync + 'static,
    {
        self.edge_length = Box::new(length);
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    /// The current degree-damping base.
    pub fn stretch(&self) -> f64 {
        self.stretch
    }

    /// Set the degree-damping base.
    pub fn set_stretch(&mut self, stretch: f64) {
        self.stretch = stretch;
    }

    /// The current repulsion cutoff radius.
    pub fn repulsion_range(&self) -> u32 {
        self.repulsion_range_sq.sqrt() as u32
    }

    /// Set the repulsion cutoff radius.
    pub fn set_repulsion_range(&mut self, range: u32) {
        self.repulsion_range_sq = (range as f64) * (range as f64);
    }

    /// The current spring force scale.
    pub fn force_multiplier(&self) -> f64 {
        self.force_multiplier
    }

    /// Set the spring force scale.
    pub fn set_force_multiplier(&mut self, force_multiplier: f64) {
        self.force_multiplier = force_multiplier;
    }

    /// The Barnes-Hut threshold the repulsion tree is built with.
    /// Changing it after attach has no effect, since the tree is built
    /// exactly once.
    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Whether the engine has been attached.
    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Bind the engine to a position store and graph view, and build the
    /// repulsion tree from the current position snapshot.
    ///
    /// Must be called exactly once before any step.
    pub fn attach(
        &mut self,
        model: Arc<LayoutModel>,
        graph: Arc<dyn GraphView>,
    ) -> Result<(), LayoutError> {
        if self.attached.is_some() {
            return Err(LayoutError::AlreadyAttached);
        }

        let snapshot = model.snapshot();
        let bounds = Rect::new(0.0, 0.0, model.width() as f64, model.height() as f64);
        let tree = BarnesHutTree::build(&snapshot, bounds, self.theta);
        debug!(
            nodes = snapshot.len(),
            theta = self.theta,
            "attached spring layout; repulsion tree built from position snapshot"
        );

        self.attached = Some(Attached { model, graph, tree });
        Ok(())
    }

    /// Advance the simulation by one step.
    pub fn step(&mut self) -> Result<(), LayoutError> {
        let Some(attached) = self.attached.as_ref() else {
            return Err(LayoutError::NotAttached);
        };
        trace!("spring layout step");

        // Decay must finish before any new force is accumulated, and
        // both force phases must finish before the commit reads them.
        decay(&self.forces);
        relax_edges(
            &self.forces,
            &attached.model,
            attached.graph.as_ref(),
            self.stretch,
            self.force_multiplier,
            &self.edge_length,
        );
        accumulate_repulsion(
            &self.forces,
            &attached.model,
            &attached.tree,
            attached.graph.as_ref(),
            self.repulsion_range_sq,
            &mut self.rng,
        );
        integrate(&self.forces, &attached.model, attached.graph.as_ref());
        Ok(())
    }
}

impl Default for SpringLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl IterativeLayout for SpringLayout {
    fn step(&mut self) -> Result<(), LayoutError> {
        SpringLayout::step(self)
    }
}

// =============================================================================
// Step phases
// =============================================================================

/// Phase 1: damp velocities, zero the per-step accumulators.
///
/// Only nodes that already have force state participate; state for new
/// nodes appears lazily when a force first touches them.
fn decay(forces: &DashMap<NodeId, ForceState>) {
    for mut entry in forces.iter_mut() {
        let state = entry.value_mut();
        state.dx *= 0.25;
        state.dy *= 0.25;
        state.edgedx = 0.0;
        state.edgedy = 0.0;
        state.repulsiondx = 0.0;
        state.repulsiondy = 0.0;
    }
}

/// Phase 2: spring attraction along every edge.
fn relax_edges(
    forces: &DashMap<NodeId, ForceState>,
    model: &LayoutModel,
    graph: &dyn GraphView,
    stretch: f64,
    force_multiplier: f64,
    edge_length: &EdgeLengthFn,
) {
    for edge in stable_edges(graph) {
        // An endpoint that has not been placed yet skips the edge for
        // this step.
        let (Some(p1), Some(p2)) = (model.get(edge.u), model.get(edge.v)) else {
            continue;
        };

        let vx = p1.x - p2.x;
        let vy = p1.y - p2.y;
        let mut len = (vx * vx + vy * vy).sqrt();
        if len == 0.0 {
            len = ZERO_LENGTH_EPSILON;
        }

        let desired = edge_length(edge);
        let mut f = force_multiplier * (desired - len) / len;
        // Damp the pull through busy endpoints: each extra incident edge
        // multiplies in another factor of stretch.
        let degree_sum = graph.degree(edge.u) + graph.degree(edge.v);
        f *= stretch.powi(degree_sum as i32 - 2);

        let dx = f * vx;
        let dy = f * vy;
        {
            let mut u = forces.entry(edge.u).or_default();
            u.edgedx += dx;
            u.edgedy += dy;
        }
        {
            let mut v = forces.entry(edge.v).or_default();
            v.edgedx -= dx;
            v.edgedy -= dy;
        }
    }
}

/// Phase 3: approximate n-body repulsion for every unlocked node.
fn accumulate_repulsion(
    forces: &DashMap<NodeId, ForceState>,
    model: &LayoutModel,
    tree: &BarnesHutTree,
    graph: &dyn GraphView,
    repulsion_range_sq: f64,
    rng: &mut SmallRng,
) {
    for node in stable_nodes(graph) {
        if model.is_locked(node) {
            continue;
        }
        let Some(p) = model.get(node) else {
            continue;
        };

        let mut dx = 0.0;
        let mut dy = 0.0;
        for object in tree.force_objects(p) {
            if object.node == Some(node) {
                continue;
            }
            let vx = p.x - object.position.x;
            let vy = p.y - object.position.y;
            let distance_sq = p.distance_squared(object.position);
            if distance_sq == 0.0 {
                // Coincident with the other node: nudge in a random
                // direction so the pair can separate next phase.
                dx += rng.random::<f64>();
                dy += rng.random::<f64>();
            } else if distance_sq < repulsion_range_sq {
                dx += vx / distance_sq;
                dy += vy / distance_sq;
            }
            // Objects beyond the cutoff contribute nothing.
        }

        let dlen = dx * dx + dy * dy;
        if dlen > 0.0 {
            let dlen = dlen.sqrt() / 2.0;
            let mut state = forces.entry(node).or_default();
            state.repulsiondx += dx / dlen;
            state.repulsiondy += dy / dlen;
        }
    }
}

/// Phase 4: fold the step's forces into the velocities and commit the
/// speed-capped displacements under one exclusive guard.
fn integrate(forces: &DashMap<NodeId, ForceState>, model: &LayoutModel, graph: &dyn GraphView) {
    let nodes = stable_nodes(graph);

    let mut guard = model.exclusive();
    let width = guard.width() as f64;
    let height = guard.height() as f64;
    for node in nodes {
        if guard.is_locked(node) {
            continue;
        }
        let Some(pos) = guard.get(node) else {
            continue;
        };

        let (x, y) = {
            let mut state = forces.entry(node).or_default();
            state.dx += state.repulsiondx + state.edgedx;
            state.dy += state.repulsiondy + state.edgedy;

            // The cap applies to the displacement, not the stored
            // velocity: a fast node keeps its momentum but moves at
            // most MAX_SPEED per axis this step.
            (
                (pos.x + state.dx.clamp(-MAX_SPEED, MAX_SPEED)).clamp(0.0, width),
                (pos.y + state.dy.clamp(-MAX_SPEED, MAX_SPEED)).clamp(0.0, height),
            )
        };
        guard.set(node, x, y);
    }
}

// =============================================================================
// Mutation-stable snapshots
// =============================================================================

fn stable_listing<T>(graph: &dyn GraphView, read: impl Fn(&dyn GraphView) -> Vec<T>) -> Vec<T> {
    for _ in 0..SNAPSHOT_RETRIES {
        let stamp = graph.mutation_stamp();
        let listing = read(graph);
        if graph.mutation_stamp() == stamp {
            return listing;
        }
        trace!("graph mutated during listing; retrying snapshot");
    }
    debug!(
        retries = SNAPSHOT_RETRIES,
        "snapshot retries exhausted under sustained mutation; using freshest listing"
    );
    read(graph)
}

fn stable_nodes(graph: &dyn GraphView) -> Vec<NodeId> {
    stable_listing(graph, |g| g.nodes())
}

fn stable_edges(graph: &dyn GraphView) -> Vec<EdgeEndpoints> {
    stable_listing(graph, |g| g.edges())
}
