//! Packet types and binary wire codec for the palaver negotiation protocol.
//!
//! Every interaction between agents (and between an agent and the
//! directory service) is one or more request/response packet pairs. A
//! packet on the wire is a fixed header -- packet kind, source agent id,
//! destination agent id -- followed by a kind-specific payload that may be
//! empty. The byte-level layout is specified in `docs/protocol.md`.
//!
//! # Modules
//!
//! - [`wire`] -- little-endian primitives ([`WireReader`], [`WireWriter`])
//! - [`packet`] -- [`PacketKind`], [`PacketHeader`], [`Packet`], [`Frame`]

pub mod packet;
pub mod wire;

pub use packet::{Frame, Packet, PacketHeader, PacketKind};
pub use wire::{WireError, WireReader, WireWriter};
