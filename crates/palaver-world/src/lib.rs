//! Node geometry and item ownership for the palaver negotiation protocol.
//!
//! A node is a participant in the trading network: an identity, a fixed
//! 2-D position, and the set of items it owns. The negotiation core only
//! ever reads nodes -- it locates them, measures distances between them,
//! and inspects their item sets; transferring items after a successful
//! negotiation is the embedding application's business.
//!
//! # Modules
//!
//! - [`node`] -- the [`Node`] record and Euclidean distance
//! - [`node_map`] -- the read-mostly [`NodeMap`] collection
//! - [`starting_cluster`] -- seeded generators for tests and demos

pub mod node;
pub mod node_map;
pub mod starting_cluster;

pub use node::{euclidean_distance, Node};
pub use node_map::NodeMap;
pub use starting_cluster::{chain_cluster, scattered_cluster, ContributionPlan, StartingCluster};

use palaver_types::NodeId;

/// Errors produced by world operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorldError {
    /// A node id was not present in the map.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// Two nodes were inserted with the same id.
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),
}
