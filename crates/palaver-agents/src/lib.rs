//! Petitioner and contributor agent state machines for palaver.
//!
//! This crate is the core of the negotiation protocol: the four
//! cooperating finite state machines and the container that owns them.
//!
//! - [`Mcc`] -- multicast contributor: registers a node's capability to
//!   supply an item with the directory and fields negotiation proposals,
//!   spawning one [`Ucc`] per accepted proposal.
//! - [`Ucc`] -- unicast contributor: answers exactly one petitioner's item
//!   request, states its price (the constraint item), and records the
//!   final outcome.
//! - [`Mcp`] -- multicast petitioner: discovers candidate contributors
//!   through the directory, ranks them by distance, and iterates proposals
//!   until one is accepted, spawning one [`Ucp`] per accepted proposal.
//! - [`Ucp`] -- unicast petitioner: drives one exchange with a remote
//!   [`Ucc`]; if the contributor demands a constraint item, it recursively
//!   spawns a child [`Mcp`] to search for it one level deeper.
//!
//! Agents are advanced cooperatively: an externally driven update tick
//! ([`AgentContainer::update_all`]) plus packet deliveries through
//! [`AgentContainer::deliver`]. Neither entry point blocks; an agent
//! "waits" only by remaining in its current state. Unexpected packets are
//! logged and ignored without side effects -- that defensive default is
//! part of the protocol, not an implementation convenience.
//!
//! # Modules
//!
//! - [`agent`] -- the closed [`Agent`] union and the [`AgentEnv`] seam
//! - [`container`] -- the arena that owns every live agent
//! - [`ranking`] -- the petitioner's ascending distance ranking
//! - [`config`] -- the per-node [`NegotiationPolicy`] knobs
//! - [`transport`] -- the outbound [`Transport`] seam trait
//! - [`mcc`], [`ucc`], [`mcp`], [`ucp`] -- the four state machines

pub mod agent;
pub mod config;
pub mod container;
pub mod mcc;
pub mod mcp;
pub mod ranking;
pub mod transport;
pub mod ucc;
pub mod ucp;

#[cfg(test)]
pub(crate) mod testutil;

pub use agent::{Agent, AgentEnv, NegotiationOutcome};
pub use config::NegotiationPolicy;
pub use container::AgentContainer;
pub use mcc::{Mcc, MccState};
pub use mcp::{Mcp, McpState};
pub use ranking::{DistanceRanking, RankedCandidate};
pub use transport::Transport;
pub use ucc::{Ucc, UccState};
pub use ucp::{Ucp, UcpState};

/// Errors produced by agent container operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AgentError {
    /// The container has handed out every id in the `u16` space.
    ///
    /// Ids are never reused within one container, so a very long-lived
    /// process that spawns past `u16::MAX - 1` agents hits this.
    #[error("agent id space exhausted")]
    IdSpaceExhausted,
}
