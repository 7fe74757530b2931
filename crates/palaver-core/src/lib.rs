//! In-process cluster runtime for the palaver negotiation protocol.
//!
//! A [`Cluster`] hosts a set of nodes and the agent trees negotiating on
//! their behalf, all advanced cooperatively from one execution context:
//! each [`Cluster::step`] first routes inbound frames to their
//! destination agents, then gives every agent one `update` tick. Nothing
//! blocks; agents that are waiting simply do nothing until the frame
//! they expect arrives.
//!
//! The crate also provides the two in-process stand-ins for the
//! protocol's external collaborators: the [`LoopbackNetwork`] (per-host
//! frame queues carrying real encoded bytes, so the wire codec is
//! exercised end-to-end) and the [`YellowPages`] directory service,
//! which speaks the registration and query packets exactly as a remote
//! directory would. A distributed deployment replaces both with real
//! TCP plumbing without touching the agent layer.
//!
//! # Modules
//!
//! - [`cluster`] -- the [`Cluster`] runtime
//! - [`directory`] -- the in-memory [`YellowPages`]
//! - [`loopback`] -- the [`LoopbackNetwork`] and its per-host transport
//! - [`config`] -- YAML configuration loading
//! - [`runner`] -- the bounded async run loop

pub mod cluster;
pub mod config;
pub mod directory;
pub mod loopback;
pub mod runner;

pub use cluster::Cluster;
pub use config::{ClusterConfig, ConfigError};
pub use directory::YellowPages;
pub use loopback::{Delivery, HostTransport, LoopbackNetwork};
pub use runner::{run_cluster, NoOpObserver, RunEndReason, RunSummary, RunnerOptions, TickObserver};

use palaver_agents::AgentError;
use palaver_types::NodeId;
use palaver_world::WorldError;

/// Errors produced by cluster operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClusterError {
    /// An agent was requested for a node this cluster does not host.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// An agent container operation failed.
    #[error("agent error: {source}")]
    Agent {
        /// The underlying container error.
        #[from]
        source: AgentError,
    },

    /// A world operation failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },
}
