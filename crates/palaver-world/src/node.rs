//! The node record and distance geometry.
//!
//! Positions are integer coordinates on a flat plane; distances are plain
//! Euclidean. The travel budget carried by petitioner agents accumulates
//! these distances edge by edge along the recursion.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use palaver_types::{ItemId, NodeId};

/// A trading participant: identity, position, and owned items.
///
/// Nodes are read-only to the negotiation core. Item sets describe what a
/// node could contribute; which contributions are actually advertised is
/// decided by whoever spawns contributor agents for the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// The node's id.
    pub id: NodeId,
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Items this node owns.
    pub items: BTreeSet<ItemId>,
}

impl Node {
    /// Create a node at a position with no items.
    pub const fn new(id: NodeId, x: i32, y: i32) -> Self {
        Self {
            id,
            x,
            y,
            items: BTreeSet::new(),
        }
    }

    /// Create a node at a position owning the given items.
    pub fn with_items(id: NodeId, x: i32, y: i32, items: impl IntoIterator<Item = ItemId>) -> Self {
        Self {
            id,
            x,
            y,
            items: items.into_iter().collect(),
        }
    }

    /// The node's position as a coordinate pair.
    pub const fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Euclidean distance from this node to a coordinate pair.
    pub fn distance_to(&self, position: (i32, i32)) -> f64 {
        euclidean_distance(self.position(), position)
    }
}

/// Euclidean distance between two integer coordinate pairs.
pub fn euclidean_distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = f64::from(a.0) - f64::from(b.0);
    let dy = f64::from(a.1) - f64::from(b.1);
    dx.hypot(dy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_four_five_triangle() {
        let node = Node::new(NodeId(0), 0, 0);
        let d = node.distance_to((3, 4));
        assert!((d - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = (-2, 7);
        let b = (10, -1);
        assert!((euclidean_distance(a, b) - euclidean_distance(b, a)).abs() < f64::EPSILON);
    }

    #[test]
    fn with_items_collects_ownership() {
        let node = Node::with_items(NodeId(1), 0, 0, [ItemId(1), ItemId(2)]);
        assert!(node.items.contains(&ItemId(1)));
        assert!(node.items.contains(&ItemId(2)));
        assert!(!node.items.contains(&ItemId(3)));
    }
}
