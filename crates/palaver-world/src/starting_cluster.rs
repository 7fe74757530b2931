//! Seeded starting clusters for tests and demos.
//!
//! Two generators: a deterministic chain (each contributor demands the
//! next item along the line, the last one is free) and a seeded random
//! scatter. Both return the node map together with the contribution plan
//! -- which node should advertise which item at what price -- so a
//! cluster can be spawned in one call.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use palaver_types::{ItemId, NodeId};

use crate::node::Node;
use crate::node_map::NodeMap;
use crate::WorldError;

/// One planned contribution: a node advertising an item at a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContributionPlan {
    /// The contributing node.
    pub node: NodeId,
    /// The item it offers.
    pub contributed: ItemId,
    /// The item it demands in exchange ([`ItemId::NONE`] if free).
    pub constraint: ItemId,
}

/// A generated starting cluster: geometry plus contribution plan.
#[derive(Debug, Clone)]
pub struct StartingCluster {
    /// The node map.
    pub nodes: NodeMap,
    /// Which contributions to spawn.
    pub contributions: Vec<ContributionPlan>,
}

/// Build a barter chain of `length` contributor nodes spaced evenly along
/// the x axis, plus a petitioner home node at the origin.
///
/// Node `0` sits at `(0, 0)` and owns item `0`; node `i` (for `1 <= i <=
/// length`) sits at `(i * spacing, 0)` and contributes item `i`. Every
/// contributor demands the next item along the chain except the last,
/// which is free. Resolving a petition for item `1` therefore takes
/// `length - 1` recursive constraint resolutions.
///
/// # Errors
///
/// Returns [`WorldError::DuplicateNode`] only if `length` wraps the id
/// space, which no realistic test does.
pub fn chain_cluster(length: u16, spacing: i32) -> Result<StartingCluster, WorldError> {
    let mut nodes = NodeMap::new();
    let mut contributions = Vec::new();

    nodes.insert(Node::with_items(NodeId(0), 0, 0, [ItemId(0)]))?;

    for i in 1..=length {
        let x = i32::from(i).saturating_mul(spacing);
        nodes.insert(Node::with_items(NodeId(i), x, 0, [ItemId(i)]))?;
        let constraint = if i == length {
            ItemId::NONE
        } else {
            ItemId(i.saturating_add(1))
        };
        contributions.push(ContributionPlan {
            node: NodeId(i),
            contributed: ItemId(i),
            constraint,
        });
    }

    Ok(StartingCluster {
        nodes,
        contributions,
    })
}

/// Scatter `node_count` nodes uniformly over a `extent` x `extent` square
/// using a seeded generator, one contribution per node.
///
/// Each node owns and contributes one item drawn from `0..item_count`;
/// roughly a third of the contributions are free, the rest demand another
/// random item from the pool. Deterministic for a given seed.
///
/// # Errors
///
/// Returns [`WorldError::DuplicateNode`] only if `node_count` wraps the
/// id space.
pub fn scattered_cluster(
    seed: u64,
    node_count: u16,
    extent: i32,
    item_count: u16,
) -> Result<StartingCluster, WorldError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut nodes = NodeMap::new();
    let mut contributions = Vec::new();
    let extent = extent.max(1);
    let item_count = item_count.max(1);

    for i in 0..node_count {
        let x = rng.random_range(0..extent);
        let y = rng.random_range(0..extent);
        let contributed = ItemId(rng.random_range(0..item_count));
        let constraint = if rng.random_bool(1.0 / 3.0) {
            ItemId::NONE
        } else {
            ItemId(rng.random_range(0..item_count))
        };
        nodes.insert(Node::with_items(NodeId(i), x, y, [contributed]))?;
        contributions.push(ContributionPlan {
            node: NodeId(i),
            contributed,
            constraint,
        });
    }

    Ok(StartingCluster {
        nodes,
        contributions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ends_with_a_free_contribution() {
        let cluster = chain_cluster(3, 10).unwrap_or_else(|_| StartingCluster {
            nodes: NodeMap::new(),
            contributions: Vec::new(),
        });
        assert_eq!(cluster.nodes.len(), 4);
        assert_eq!(cluster.contributions.len(), 3);
        assert_eq!(
            cluster.contributions.last().map(|c| c.constraint),
            Some(ItemId::NONE)
        );
        assert_eq!(
            cluster.contributions.first().map(|c| c.constraint),
            Some(ItemId(2))
        );
    }

    #[test]
    fn chain_spacing_is_even() {
        let cluster = chain_cluster(2, 7).unwrap_or_else(|_| StartingCluster {
            nodes: NodeMap::new(),
            contributions: Vec::new(),
        });
        assert_eq!(cluster.nodes.get(NodeId(2)).map(|n| n.x), Some(14));
    }

    #[test]
    fn scatter_is_deterministic_per_seed() {
        let a = scattered_cluster(42, 8, 100, 5).map(|c| c.contributions);
        let b = scattered_cluster(42, 8, 100, 5).map(|c| c.contributions);
        assert_eq!(a.ok(), b.ok());
    }
}
