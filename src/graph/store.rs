//! Graph view trait and the default petgraph-backed store.
//!
//! The layout engine never owns the graph. It observes it through the
//! [`GraphView`] trait: node and edge listings, degree queries, and a
//! mutation stamp that lets the engine detect structural changes made by
//! another thread while a step is iterating.
//!
//! [`GraphStore`] is the default implementation: an undirected petgraph
//! `StableGraph` behind a lock, safe to share with a mutating thread
//! while a layout runs against it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use petgraph::Undirected;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};

use super::{EdgeEndpoints, NodeId};

/// Read-only view of a graph, as the layout engine consumes it.
///
/// Listings are snapshots: the returned vectors do not observe later
/// mutations. Implementations must bump the mutation stamp on every
/// structural change (node or edge added or removed) so that callers can
/// pair a stamp read with a listing and detect a concurrent mutation.
pub trait GraphView: Send + Sync {
    /// All node ids currently in the graph, in a deterministic order.
    fn nodes(&self) -> Vec<NodeId>;

    /// All edges as endpoint pairs, in a deterministic order.
    fn edges(&self) -> Vec<EdgeEndpoints>;

    /// Number of edges incident to `node`; 0 for unknown nodes.
    fn degree(&self, node: NodeId) -> usize;

    /// Monotonic counter incremented on every structural mutation.
    fn mutation_stamp(&self) -> u64;
}

struct StoreInner {
    /// Node weights carry the stable external id; edge weights a f32.
    graph: StableGraph<NodeId, f32, Undirected>,
    /// Map from stable NodeId to petgraph NodeIndex.
    indices: HashMap<NodeId, NodeIndex>,
    /// Next node id to assign.
    next_node_id: u32,
}

/// Thread-safe undirected graph store.
///
/// Structural mutations take the inner write lock and bump the mutation
/// stamp; listings take the read lock. A layout stepping on one thread
/// and a caller mutating on another never see torn state, only stale
/// state, which the engine's snapshot protocol tolerates.
pub struct GraphStore {
    inner: RwLock<StoreInner>,
    // Advisory version counter; the lock orders the data itself.
    stamp: AtomicU64,
}

impl GraphStore {
    /// Create a new empty graph store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                graph: StableGraph::default(),
                indices: HashMap::new(),
                next_node_id: 0,
            }),
            stamp: AtomicU64::new(0),
        }
    }

    /// Create a graph store with pre-allocated capacity.
    pub fn with_capacity(node_capacity: usize, edge_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                graph: StableGraph::with_capacity(node_capacity, edge_capacity),
                indices: HashMap::with_capacity(node_capacity),
                next_node_id: 0,
            }),
            stamp: AtomicU64::new(0),
        }
    }

    #[inline]
    fn bump(&self) {
        self.stamp.fetch_add(1, Ordering::Relaxed);
    }

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// Add a node, returning its stable id.
    pub fn add_node(&self) -> NodeId {
        let mut inner = self.inner.write();
        let id = NodeId(inner.next_node_id);
        inner.next_node_id += 1;

        let index = inner.graph.add_node(id);
        inner.indices.insert(id, index);
        drop(inner);

        self.bump();
        id
    }

    /// Remove a node and all edges incident to it.
    ///
    /// Returns true if the node existed and was removed.
    pub fn remove_node(&self, id: NodeId) -> bool {
        let mut inner = self.inner.write();
        let Some(index) = inner.indices.remove(&id) else {
            return false;
        };
        inner.graph.remove_node(index);
        drop(inner);

        self.bump();
        true
    }

    /// Check whether a node is present.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.inner.read().indices.contains_key(&id)
    }

    /// Get the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.inner.read().graph.node_count()
    }

    // =========================================================================
    // Edge Operations
    // =========================================================================

    /// Add an edge between two nodes.
    ///
    /// Returns false if either endpoint does not exist.
    pub fn add_edge(&self, u: NodeId, v: NodeId, weight: f32) -> bool {
        let mut inner = self.inner.write();
        let (Some(&ui), Some(&vi)) = (inner.indices.get(&u), inner.indices.get(&v)) else {
            return false;
        };
        inner.graph.add_edge(ui, vi, weight);
        drop(inner);

        self.bump();
        true
    }

    /// Remove the edge between two nodes, if any.
    ///
    /// Returns true if an edge existed and was removed. With parallel
    /// edges, removes one of them.
    pub fn remove_edge(&self, u: NodeId, v: NodeId) -> bool {
        let mut inner = self.inner.write();
        let (Some(&ui), Some(&vi)) = (inner.indices.get(&u), inner.indices.get(&v)) else {
            return false;
        };
        let Some(edge) = inner.graph.find_edge(ui, vi) else {
            return false;
        };
        inner.graph.remove_edge(edge);
        drop(inner);

        self.bump();
        true
    }

    /// Weight of the edge between two nodes, if one exists.
    pub fn edge_weight(&self, u: NodeId, v: NodeId) -> Option<f32> {
        let inner = self.inner.read();
        let (&ui, &vi) = (inner.indices.get(&u)?, inner.indices.get(&v)?);
        let edge = inner.graph.find_edge(ui, vi)?;
        inner.graph.edge_weight(edge).copied()
    }

    /// Get the number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.inner.read().graph.edge_count()
    }

    /// Neighbors of a node; empty for unknown nodes.
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let inner = self.inner.read();
        let Some(&index) = inner.indices.get(&id) else {
            return Vec::new();
        };
        inner
            .graph
            .neighbors(index)
            .filter_map(|n| inner.graph.node_weight(n).copied())
            .collect()
    }

    /// Remove all nodes and edges, resetting id allocation.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.graph.clear();
        inner.indices.clear();
        inner.next_node_id = 0;
        drop(inner);

        self.bump();
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphView for GraphStore {
    fn nodes(&self) -> Vec<NodeId> {
        let inner = self.inner.read();
        inner
            .graph
            .node_indices()
            .filter_map(|i| inner.graph.node_weight(i).copied())
            .collect()
    }

    fn edges(&self) -> Vec<EdgeEndpoints> {
        let inner = self.inner.read();
        inner
            .graph
            .edge_references()
            .filter_map(|e| {
                let u = inner.graph.node_weight(e.source()).copied()?;
                let v = inner.graph.node_weight(e.target()).copied()?;
                Some(EdgeEndpoints::new(u, v))
            })
            .collect()
    }

    fn degree(&self, node: NodeId) -> usize {
        let inner = self.inner.read();
        inner
            .indices
            .get(&node)
            .map(|&index| inner.graph.edges(index).count())
            .unwrap_or(0)
    }

    fn mutation_stamp(&self) -> u64 {
        self.stamp.load(Ordering::Relaxed)
    }
}
