//! Edge endpoint pair.
//!
//! The layout engine consumes edges as unordered endpoint pairs: an edge
//! between `u` and `v` pulls on both of them symmetrically, so nothing in
//! the force computation depends on which endpoint is listed first.

use std::fmt;

use super::NodeId;

/// The two endpoints of an edge.
///
/// Semantically an unordered pair: `(u, v)` and `(v, u)` name the same
/// edge. The derived equality compares fields in order, so callers that
/// key maps by endpoints should normalize with [`EdgeEndpoints::sorted`]
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeEndpoints {
    /// One endpoint.
    pub u: NodeId,
    /// The other endpoint.
    pub v: NodeId,
}

impl EdgeEndpoints {
    /// Create an endpoint pair.
    #[inline]
    pub fn new(u: NodeId, v: NodeId) -> Self {
        Self { u, v }
    }

    /// Check whether `node` is one of the two endpoints.
    #[inline]
    pub fn contains(self, node: NodeId) -> bool {
        self.u == node || self.v == node
    }

    /// The endpoint opposite `node`, or None if `node` is not an endpoint.
    pub fn opposite(self, node: NodeId) -> Option<NodeId> {
        if node == self.u {
            Some(self.v)
        } else if node == self.v {
            Some(self.u)
        } else {
            None
        }
    }

    /// The same pair with the smaller id first, for use as a map key.
    pub fn sorted(self) -> Self {
        if self.u <= self.v {
            self
        } else {
            Self { u: self.v, v: self.u }
        }
    }
}

impl fmt::Display for EdgeEndpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge({} -- {})", self.u, self.v)
    }
}
