//! The read-mostly collection of nodes known to one cluster.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use palaver_types::NodeId;

use crate::node::{euclidean_distance, Node};
use crate::WorldError;

/// All nodes hosted by (or known to) one cluster, keyed by id.
///
/// Built once at startup and treated as read-only by the negotiation
/// core; agents look their own node up to answer position probes and to
/// measure candidate distances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMap {
    nodes: BTreeMap<NodeId, Node>,
}

impl NodeMap {
    /// Create an empty map.
    pub const fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    /// Insert a node.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateNode`] if the id is already present.
    pub fn insert(&mut self, node: Node) -> Result<(), WorldError> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(WorldError::DuplicateNode(id));
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    /// Look a node up by id.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Look a node up by id, failing loudly for unknown ids.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::UnknownNode`] if the id is not present.
    pub fn require(&self, id: NodeId) -> Result<&Node, WorldError> {
        self.nodes.get(&id).ok_or(WorldError::UnknownNode(id))
    }

    /// Euclidean distance between two known nodes.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::UnknownNode`] if either id is not present.
    pub fn distance_between(&self, a: NodeId, b: NodeId) -> Result<f64, WorldError> {
        let a = self.require(a)?;
        let b = self.require(b)?;
        Ok(euclidean_distance(a.position(), b.position()))
    }

    /// Number of nodes in the map.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the map holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut map = NodeMap::new();
        assert!(map.insert(Node::new(NodeId(1), 0, 0)).is_ok());
        assert_eq!(
            map.insert(Node::new(NodeId(1), 5, 5)),
            Err(WorldError::DuplicateNode(NodeId(1)))
        );
    }

    #[test]
    fn distance_between_known_nodes() {
        let mut map = NodeMap::new();
        let _ = map.insert(Node::new(NodeId(1), 0, 0));
        let _ = map.insert(Node::new(NodeId(2), 3, 4));
        let d = map.distance_between(NodeId(1), NodeId(2)).unwrap_or_default();
        assert!((d - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_node_is_an_error() {
        let map = NodeMap::new();
        assert_eq!(map.require(NodeId(9)).err(), Some(WorldError::UnknownNode(NodeId(9))));
    }
}
