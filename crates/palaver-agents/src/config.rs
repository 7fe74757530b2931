//! Per-node negotiation policy knobs.
//!
//! These bound the recursive search: how deep constraint resolution may
//! recurse, how many ranked candidates a petitioner will try, and how far
//! a trade chain may geographically stretch. The cluster constructs this
//! from its configuration file and hands it, read-only, to every agent.

/// Search bounds applied by the petitioner side of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiationPolicy {
    /// Maximum recursion depth for constraint resolution (default: 10).
    ///
    /// A unicast petitioner at this depth gives up instead of spawning a
    /// deeper search.
    pub max_depth: u32,

    /// Maximum number of ranked candidates a petitioner tries before
    /// giving up (default: 5).
    pub max_nearest: usize,

    /// Maximum cumulative travel distance for a trade chain (default:
    /// unbounded).
    ///
    /// A candidate whose distance plus the distance already traveled
    /// exceeds this never enters the ranking.
    pub max_travel_distance: f64,
}

impl Default for NegotiationPolicy {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_nearest: 5,
            max_travel_distance: f64::INFINITY,
        }
    }
}
