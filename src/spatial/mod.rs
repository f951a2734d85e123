//! Spatial indexing for approximate n-body force queries.
//!
//! A Barnes-Hut quadtree built from a position snapshot; distant cells
//! collapse into single center-of-mass force objects under the theta
//! criterion, giving O(n log n) repulsion instead of all-pairs O(n²).

mod quadtree;

pub use quadtree::{BarnesHutTree, ForceObject, ForceObjectIter, Rect};
