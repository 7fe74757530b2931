//! Unicast contributor: one transaction, one petitioner.
//!
//! Spawned by a multicast contributor when it accepts a proposal and
//! reaped by it once the transaction concludes. The machine is purely
//! reactive -- it has no time-driven transitions at all:
//!
//! ```text
//! WaitingItemRequest --RequestItem--> WaitingItemConstraint
//! WaitingItemConstraint --SendConstraint--> NegotiationFinished
//! ```
//!
//! The contributor states its price (the constraint item, or the null
//! sentinel for a free item) and then takes the petitioner's word for the
//! outcome: the agreement flag in `SendConstraint` is recorded verbatim,
//! and the offered item is not checked against the configured constraint.
//! That trust assumption is part of the protocol.

use tracing::{debug, warn};

use palaver_proto::{Packet, PacketHeader};
use palaver_types::{AgentId, HostAddr, ItemId, NodeId};

use crate::agent::{reply_location, send_to_agent, AgentEnv};

/// States of the unicast contributor machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UccState {
    /// Waiting for the petitioner's item request.
    WaitingItemRequest,
    /// Price stated; waiting for the petitioner's final answer.
    WaitingItemConstraint,
    /// Transaction closed (terminal).
    NegotiationFinished,
}

/// The unicast contributor machine.
#[derive(Debug)]
pub struct Ucc {
    id: AgentId,
    node: NodeId,
    contributed: ItemId,
    constraint: ItemId,
    state: UccState,
    agreement: bool,
}

impl Ucc {
    pub(crate) const fn new(
        id: AgentId,
        node: NodeId,
        contributed: ItemId,
        constraint: ItemId,
    ) -> Self {
        Self {
            id,
            node,
            contributed,
            constraint,
            state: UccState::WaitingItemRequest,
            agreement: false,
        }
    }

    /// The agent's id.
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// The node this contributor works for.
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// The item this worker hands over.
    pub const fn contributed(&self) -> ItemId {
        self.contributed
    }

    /// The item demanded in exchange ([`ItemId::NONE`] if free).
    pub const fn constraint(&self) -> ItemId {
        self.constraint
    }

    /// Current state.
    pub const fn state(&self) -> UccState {
        self.state
    }

    /// Whether the transaction has concluded.
    pub const fn negotiation_finished(&self) -> bool {
        matches!(self.state, UccState::NegotiationFinished)
    }

    /// Whether the petitioner declared agreement.
    pub const fn negotiation_agreement(&self) -> bool {
        self.agreement
    }

    pub(crate) fn on_packet(
        &mut self,
        env: &mut AgentEnv<'_>,
        origin: &HostAddr,
        header: &PacketHeader,
        packet: &Packet,
    ) {
        match packet {
            Packet::RequestItem { item } if matches!(self.state, UccState::WaitingItemRequest) => {
                if *item != self.contributed {
                    // Answer anyway; the petitioner asked us by address,
                    // so the mismatch is its bookkeeping problem.
                    warn!(
                        id = %self.id,
                        requested = %item,
                        contributed = %self.contributed,
                        "item request does not match contribution"
                    );
                }
                let sent = send_to_agent(
                    env,
                    &reply_location(origin, header),
                    self.id,
                    Packet::RequestItemResponse {
                        constraint: self.constraint,
                    },
                );
                if !sent {
                    warn!(id = %self.id, "failed to send item response");
                }
                self.state = UccState::WaitingItemConstraint;
            }
            Packet::SendConstraint { agreement, offered }
                if matches!(self.state, UccState::WaitingItemConstraint) =>
            {
                // The offered item is deliberately not validated against
                // the configured constraint.
                self.agreement = *agreement;
                let sent = send_to_agent(
                    env,
                    &reply_location(origin, header),
                    self.id,
                    Packet::SendConstraintResponse,
                );
                if !sent {
                    warn!(id = %self.id, "failed to close transaction");
                }
                debug!(
                    id = %self.id,
                    agreement = *agreement,
                    offered = %offered,
                    "unicast contribution concluded"
                );
                self.state = UccState::NegotiationFinished;
            }
            other => {
                warn!(
                    id = %self.id,
                    packet = %other.kind(),
                    state = ?self.state,
                    "unexpected packet ignored"
                );
            }
        }
    }
}
