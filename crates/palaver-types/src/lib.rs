//! Shared type definitions for the palaver negotiation protocol.
//!
//! This crate is the single source of truth for the identifiers and
//! addressing types used across the palaver workspace. Everything here is
//! a plain value type: ids are the fixed-width integers that travel on the
//! wire, and [`AgentLocation`] is the unit of addressing for every
//! cross-host message.
//!
//! # Modules
//!
//! - [`ids`] -- Wire-width newtype wrappers for all entity identifiers
//! - [`location`] -- Host addresses and remote agent locations

pub mod ids;
pub mod location;

// Re-export all public types at crate root for convenience.
pub use ids::{AgentId, ItemId, NodeId};
pub use location::{AgentLocation, HostAddr};
