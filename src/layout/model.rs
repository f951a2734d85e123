//! Position store shared between the layout engine and a renderer.
//!
//! The model owns one 2-D point per placed node, a fixed width/height
//! bound, and a locked-node set. A renderer may read positions at any
//! time; the engine's commit phase takes the exclusive guard so a reader
//! never observes a half-written step.

use std::collections::{HashMap, HashSet};

use parking_lot::{RwLock, RwLockWriteGuard};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

/// A position in layout space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[inline]
    pub fn distance_squared(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

#[derive(Debug, Default)]
struct ModelState {
    positions: HashMap<NodeId, Point>,
    locked: HashSet<NodeId>,
}

/// Concurrently readable position store with fixed bounds.
///
/// All committed positions satisfy `0 <= x <= width` and
/// `0 <= y <= height`; writes outside the bounds are clamped. Locking a
/// node marks it as not-to-be-moved; honoring the flag is the layout
/// engine's job, the model only stores it.
pub struct LayoutModel {
    width: u32,
    height: u32,
    state: RwLock<ModelState>,
}

impl LayoutModel {
    /// Create an empty model with the given bounds.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            state: RwLock::new(ModelState::default()),
        }
    }

    /// Width of the layout area.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the layout area.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Position of a node, or None if it has not been placed.
    pub fn get(&self, node: NodeId) -> Option<Point> {
        self.state.read().positions.get(&node).copied()
    }

    /// Place a node, clamping the position into the model bounds.
    pub fn set(&self, node: NodeId, x: f64, y: f64) {
        let p = self.clamped(x, y);
        self.state.write().positions.insert(node, p);
    }

    /// Check whether a node is locked in place.
    pub fn is_locked(&self, node: NodeId) -> bool {
        self.state.read().locked.contains(&node)
    }

    /// Lock or unlock a node.
    pub fn set_locked(&self, node: NodeId, locked: bool) {
        let mut state = self.state.write();
        if locked {
            state.locked.insert(node);
        } else {
            state.locked.remove(&node);
        }
    }

    /// Number of placed nodes.
    pub fn len(&self) -> usize {
        self.state.read().positions.len()
    }

    /// Check whether any node has been placed.
    pub fn is_empty(&self) -> bool {
        self.state.read().positions.is_empty()
    }

    /// Consistent listing of all placed nodes and their positions,
    /// ordered by node id so downstream consumers (like spatial index
    /// construction) behave identically across runs.
    pub fn snapshot(&self) -> Vec<(NodeId, Point)> {
        let mut listing: Vec<(NodeId, Point)> = self
            .state
            .read()
            .positions
            .iter()
            .map(|(&id, &p)| (id, p))
            .collect();
        listing.sort_unstable_by_key(|&(id, _)| id);
        listing
    }

    /// Take exclusive write access for a batch of position updates.
    ///
    /// Concurrent readers block until the guard is dropped, so a whole
    /// commit pass becomes atomic from their point of view.
    pub fn exclusive(&self) -> ExclusiveCommit<'_> {
        ExclusiveCommit {
            width: self.width,
            height: self.height,
            state: self.state.write(),
        }
    }

    /// Place every listed node uniformly at random inside the bounds.
    ///
    /// Typical use is seeding a fresh layout before relaxation begins.
    pub fn scatter<R: Rng>(&self, nodes: &[NodeId], rng: &mut R) {
        let mut state = self.state.write();
        for &node in nodes {
            let x = rng.random_range(0.0..=self.width as f64);
            let y = rng.random_range(0.0..=self.height as f64);
            state.positions.insert(node, Point::new(x, y));
        }
    }

    #[inline]
    fn clamped(&self, x: f64, y: f64) -> Point {
        Point::new(
            x.clamp(0.0, self.width as f64),
            y.clamp(0.0, self.height as f64),
        )
    }
}

/// Write guard over the model for an all-or-nothing commit pass.
pub struct ExclusiveCommit<'a> {
    width: u32,
    height: u32,
    state: RwLockWriteGuard<'a, ModelState>,
}

impl ExclusiveCommit<'_> {
    /// Width of the layout area.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the layout area.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Position of a node, or None if it has not been placed.
    pub fn get(&self, node: NodeId) -> Option<Point> {
        self.state.positions.get(&node).copied()
    }

    /// Check whether a node is locked in place.
    pub fn is_locked(&self, node: NodeId) -> bool {
        self.state.locked.contains(&node)
    }

    /// Place a node, clamping the position into the model bounds.
    pub fn set(&mut self, node: NodeId, x: f64, y: f64) {
        let p = Point::new(
            x.clamp(0.0, self.width as f64),
            y.clamp(0.0, self.height as f64),
        );
        self.state.positions.insert(node, p);
    }
}
