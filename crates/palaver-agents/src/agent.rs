//! The closed agent union and the environment seam.
//!
//! The four concrete state machines are dispatched by kind tag through
//! [`Agent`]; there is no trait object and no downcasting. Everything an
//! agent needs from the outside world -- node geometry, the admission
//! ledger, the policy knobs, the transport -- travels in one [`AgentEnv`]
//! borrow, so handlers stay synchronous and never reach for globals.

use tracing::warn;

use palaver_ledger::AdmissionLedger;
use palaver_proto::{Frame, Packet, PacketHeader};
use palaver_types::{AgentId, AgentLocation, HostAddr, NodeId};
use palaver_world::NodeMap;

use crate::config::NegotiationPolicy;
use crate::container::AgentContainer;
use crate::mcc::Mcc;
use crate::mcp::Mcp;
use crate::transport::Transport;
use crate::ucc::Ucc;
use crate::ucp::Ucp;

/// Everything an agent may touch while handling a tick or a packet.
///
/// Borrowed afresh for each entry into the agent layer; the cluster owns
/// the underlying state and serializes access by construction (one
/// execution context per cluster).
pub struct AgentEnv<'a> {
    /// Node geometry and item ownership, read-only.
    pub nodes: &'a NodeMap,
    /// The shared admission ledger.
    pub ledger: &'a mut AdmissionLedger,
    /// Search bounds.
    pub policy: &'a NegotiationPolicy,
    /// Outbound frame delivery.
    pub transport: &'a mut dyn Transport,
    /// The host address agents on this cluster are reachable at; used to
    /// build the advertised location of freshly spawned workers.
    pub local_host: &'a HostAddr,
}

/// A child's negotiation result as observed by its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationOutcome {
    /// Whether the negotiation has concluded.
    pub finished: bool,
    /// Whether it concluded in agreement (meaningless until finished).
    pub agreement: bool,
}

/// A live agent: one of the four machine kinds.
#[derive(Debug)]
pub enum Agent {
    /// Multicast contributor.
    Mcc(Mcc),
    /// Unicast contributor.
    Ucc(Ucc),
    /// Multicast petitioner.
    Mcp(Mcp),
    /// Unicast petitioner.
    Ucp(Ucp),
}

impl Agent {
    /// The agent's id.
    pub const fn id(&self) -> AgentId {
        match self {
            Self::Mcc(a) => a.id(),
            Self::Ucc(a) => a.id(),
            Self::Mcp(a) => a.id(),
            Self::Ucp(a) => a.id(),
        }
    }

    /// The node this agent negotiates on behalf of.
    pub const fn node(&self) -> NodeId {
        match self {
            Self::Mcc(a) => a.node(),
            Self::Ucc(a) => a.node(),
            Self::Mcp(a) => a.node(),
            Self::Ucp(a) => a.node(),
        }
    }

    /// Short kind name for log lines.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Mcc(_) => "mcc",
            Self::Ucc(_) => "ucc",
            Self::Mcp(_) => "mcp",
            Self::Ucp(_) => "ucp",
        }
    }

    /// Whether this agent's negotiation has concluded.
    pub const fn negotiation_finished(&self) -> bool {
        match self {
            Self::Mcc(a) => a.negotiation_finished(),
            Self::Ucc(a) => a.negotiation_finished(),
            Self::Mcp(a) => a.negotiation_finished(),
            Self::Ucp(a) => a.negotiation_finished(),
        }
    }

    /// Whether the concluded negotiation reached agreement.
    pub const fn negotiation_agreement(&self) -> bool {
        match self {
            Self::Mcc(a) => a.negotiation_agreement(),
            Self::Ucc(a) => a.negotiation_agreement(),
            Self::Mcp(a) => a.negotiation_agreement(),
            Self::Ucp(a) => a.negotiation_agreement(),
        }
    }

    /// Advance the time-driven side of the machine by one tick.
    pub(crate) fn update(&mut self, env: &mut AgentEnv<'_>, agents: &mut AgentContainer) {
        match self {
            Self::Mcc(a) => a.update(env, agents),
            // The unicast contributor is purely reactive.
            Self::Ucc(_) => {}
            Self::Mcp(a) => a.update(env, agents),
            Self::Ucp(a) => a.update(env, agents),
        }
    }

    /// Feed one received packet to the event-driven side of the machine.
    pub(crate) fn on_packet(
        &mut self,
        env: &mut AgentEnv<'_>,
        agents: &mut AgentContainer,
        origin: &HostAddr,
        header: &PacketHeader,
        packet: &Packet,
    ) {
        match self {
            Self::Mcc(a) => a.on_packet(env, agents, origin, header, packet),
            Self::Ucc(a) => a.on_packet(env, origin, header, packet),
            Self::Mcp(a) => a.on_packet(env, agents, header, packet),
            Self::Ucp(a) => a.on_packet(env, agents, header, packet),
        }
    }

    /// Whether the agent has fully shut down and should leave the arena.
    pub(crate) const fn defunct(&self) -> bool {
        match self {
            Self::Mcc(a) => a.is_finished(),
            // The other kinds linger until their owner reaps them.
            Self::Ucc(_) | Self::Mcp(_) | Self::Ucp(_) => false,
        }
    }
}

/// Encode and send a packet to a remote agent, returning the transport's
/// verdict. Encoding failures are logged and reported as a failed send.
pub(crate) fn send_to_agent(
    env: &mut AgentEnv<'_>,
    dest: &AgentLocation,
    src: AgentId,
    packet: Packet,
) -> bool {
    let frame = Frame::new(src, dest.agent, packet);
    match frame.encode() {
        Ok(bytes) => env.transport.send_to_agent(dest, &bytes),
        Err(err) => {
            warn!(%err, %dest, "failed to encode outgoing frame");
            false
        }
    }
}

/// Encode and send a packet to the directory service.
pub(crate) fn send_to_directory(env: &mut AgentEnv<'_>, src: AgentId, packet: Packet) -> bool {
    let frame = Frame::to_directory(src, packet);
    match frame.encode() {
        Ok(bytes) => env.transport.send_to_directory(&bytes),
        Err(err) => {
            warn!(%err, "failed to encode directory frame");
            false
        }
    }
}

/// The reply address for an inbound packet: the host it physically came
/// from plus the agent id its header names as source.
pub(crate) fn reply_location(origin: &HostAddr, header: &PacketHeader) -> AgentLocation {
    AgentLocation::new(origin.clone(), header.src)
}
