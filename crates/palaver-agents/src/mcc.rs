//! Multicast contributor: advertises a node's supply of one item.
//!
//! The contributor registers with the directory, then fields negotiation
//! proposals from petitioners. Accepting a proposal reserves the
//! constraint item in the admission ledger, spawns a unicast contributor
//! to run the transaction, and tells the petitioner where to find it.
//!
//! ```text
//! Init --register sent--> Registering --ack--> Idle
//! Idle --proposal accepted--> Negotiating --child failed--> Idle
//! Negotiating --child agreed--> NegotiationFinished
//! any --stop()--> Unregistering --ack--> Finished (self-destructs)
//! ```
//!
//! Invariants: at most one child worker at a time, and the ledger
//! reservation taken on acceptance is released exactly once, whether the
//! transaction succeeds, fails, or is torn down.

use tracing::{debug, info, warn};

use palaver_proto::{Packet, PacketHeader};
use palaver_types::{AgentId, AgentLocation, HostAddr, ItemId, NodeId};

use crate::agent::{reply_location, send_to_agent, send_to_directory, AgentEnv};
use crate::container::AgentContainer;

/// States of the multicast contributor machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MccState {
    /// About to register with the directory.
    Init,
    /// Registration sent; waiting for the acknowledgement.
    Registering,
    /// Registered and available for proposals.
    Idle,
    /// A unicast contributor is running a transaction.
    Negotiating,
    /// A transaction concluded in agreement; awaiting external reaping.
    NegotiationFinished,
    /// Unregistration sent; waiting for the acknowledgement.
    Unregistering,
    /// Fully shut down (terminal; leaves the arena on the next tick).
    Finished,
}

/// The multicast contributor machine.
#[derive(Debug)]
pub struct Mcc {
    id: AgentId,
    node: NodeId,
    contributed: ItemId,
    constraint: ItemId,
    state: MccState,
    child: Option<AgentId>,
    /// The constraint item currently reserved in the ledger, if any.
    reservation: Option<ItemId>,
    agreement: bool,
}

impl Mcc {
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
            state: MccState::Init,
            child: None,
            reservation: None,
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

    /// The item this contributor supplies.
    pub const fn contributed(&self) -> ItemId {
        self.contributed
    }

    /// The item demanded in exchange ([`ItemId::NONE`] if free).
    pub const fn constraint(&self) -> ItemId {
        self.constraint
    }

    /// Current state.
    pub const fn state(&self) -> MccState {
        self.state
    }

    /// Whether the contributor is registered and available.
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, MccState::Idle)
    }

    /// Whether a transaction concluded in agreement and the contributor
    /// is waiting to be reaped (the item should change hands now).
    pub const fn deal_concluded(&self) -> bool {
        matches!(self.state, MccState::NegotiationFinished)
    }

    /// Whether the contributor has fully shut down.
    pub const fn negotiation_finished(&self) -> bool {
        matches!(self.state, MccState::Finished)
    }

    /// Whether the last concluded transaction reached agreement.
    pub const fn negotiation_agreement(&self) -> bool {
        self.agreement
    }

    pub(crate) const fn is_finished(&self) -> bool {
        matches!(self.state, MccState::Finished)
    }

    /// The id of the current child worker, if one is running.
    pub const fn child(&self) -> Option<AgentId> {
        self.child
    }

    pub(crate) fn update(&mut self, env: &mut AgentEnv<'_>, agents: &mut AgentContainer) {
        match self.state {
            MccState::Init => {
                let sent = send_to_directory(
                    env,
                    self.id,
                    Packet::RegisterMcc {
                        item: self.contributed,
                    },
                );
                if sent {
                    self.state = MccState::Registering;
                } else {
                    warn!(id = %self.id, "registration send failed; contributor shutting down");
                    self.state = MccState::Finished;
                }
            }
            MccState::Negotiating => self.poll_child(env, agents),
            // Registering and Unregistering resolve in on_packet; Idle,
            // NegotiationFinished and Finished have no timed work.
            MccState::Registering
            | MccState::Idle
            | MccState::NegotiationFinished
            | MccState::Unregistering
            | MccState::Finished => {}
        }
    }

    fn poll_child(&mut self, env: &mut AgentEnv<'_>, agents: &mut AgentContainer) {
        let Some(child) = self.child else {
            warn!(id = %self.id, "negotiating with no child worker; returning to idle");
            self.release_reservation(env);
            self.state = MccState::Idle;
            return;
        };
        match agents.outcome(child) {
            Some(outcome) if outcome.finished => {
                self.release_reservation(env);
                agents.stop(child, env);
                self.child = None;
                if outcome.agreement {
                    self.agreement = true;
                    self.state = MccState::NegotiationFinished;
                    info!(
                        id = %self.id,
                        item = %self.contributed,
                        "contribution agreed"
                    );
                } else {
                    self.state = MccState::Idle;
                }
            }
            Some(_) => {}
            None => {
                warn!(id = %self.id, %child, "child worker vanished; returning to idle");
                self.release_reservation(env);
                self.child = None;
                self.state = MccState::Idle;
            }
        }
    }

    pub(crate) fn on_packet(
        &mut self,
        env: &mut AgentEnv<'_>,
        agents: &mut AgentContainer,
        origin: &HostAddr,
        header: &PacketHeader,
        packet: &Packet,
    ) {
        match packet {
            Packet::RegisterMccAck if matches!(self.state, MccState::Registering) => {
                debug!(id = %self.id, item = %self.contributed, "registered with directory");
                self.state = MccState::Idle;
            }
            Packet::UnregisterMccAck if matches!(self.state, MccState::Unregistering) => {
                debug!(id = %self.id, item = %self.contributed, "unregistered from directory");
                self.state = MccState::Finished;
            }
            Packet::PositionRequest
                if matches!(
                    self.state,
                    MccState::Idle | MccState::Negotiating | MccState::NegotiationFinished
                ) =>
            {
                self.answer_position(env, origin, header);
            }
            Packet::NegotiationProposalRequest
                if matches!(self.state, MccState::Idle | MccState::Negotiating) =>
            {
                self.handle_proposal(env, agents, origin, header);
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

    fn answer_position(&self, env: &mut AgentEnv<'_>, origin: &HostAddr, header: &PacketHeader) {
        let Some(node) = env.nodes.get(self.node) else {
            warn!(id = %self.id, node = %self.node, "own node unknown; position request dropped");
            return;
        };
        let (x, y) = node.position();
        let sent = send_to_agent(
            env,
            &reply_location(origin, header),
            self.id,
            Packet::PositionAnswer { x, y },
        );
        if !sent {
            warn!(id = %self.id, "failed to answer position request");
        }
    }

    fn handle_proposal(
        &mut self,
        env: &mut AgentEnv<'_>,
        agents: &mut AgentContainer,
        origin: &HostAddr,
        header: &PacketHeader,
    ) {
        let approved = self.try_accept(env, agents);
        let answer = match approved {
            Some(ucc) => Packet::NegotiationProposalAnswer {
                approved: true,
                ucc,
            },
            None => Packet::NegotiationProposalAnswer {
                approved: false,
                ucc: AgentLocation::unspecified(),
            },
        };
        let sent = send_to_agent(env, &reply_location(origin, header), self.id, answer);
        if !sent {
            warn!(id = %self.id, "failed to answer negotiation proposal");
        }
    }

    /// Accept the proposal if idle and admissible; returns the spawned
    /// worker's advertised location on acceptance.
    fn try_accept(
        &mut self,
        env: &mut AgentEnv<'_>,
        agents: &mut AgentContainer,
    ) -> Option<AgentLocation> {
        if !matches!(self.state, MccState::Idle) {
            // Busy contributors reject rather than ignore, so the
            // petitioner can move on to the next candidate.
            return None;
        }
        if !env.ledger.is_missing(self.node, self.constraint) {
            debug!(
                id = %self.id,
                constraint = %self.constraint,
                "constraint already committed on this node; proposal rejected"
            );
            return None;
        }
        if !self.constraint.is_none() {
            if let Err(err) = env.ledger.reserve(self.node, self.constraint) {
                warn!(id = %self.id, %err, "reservation failed; proposal rejected");
                return None;
            }
            self.reservation = Some(self.constraint);
        }
        match agents.spawn_ucc(self.node, self.contributed, self.constraint) {
            Ok(child) => {
                self.child = Some(child);
                self.agreement = false;
                self.state = MccState::Negotiating;
                Some(AgentLocation::new(env.local_host.clone(), child))
            }
            Err(err) => {
                warn!(id = %self.id, %err, "worker spawn failed; proposal rejected");
                self.release_reservation(env);
                None
            }
        }
    }

    /// Graceful shutdown: tear down the child, release any reservation,
    /// and retract the directory registration. Idempotent.
    pub(crate) fn begin_stop(&mut self, env: &mut AgentEnv<'_>, agents: &mut AgentContainer) {
        if matches!(self.state, MccState::Unregistering | MccState::Finished) {
            return;
        }
        // Descendants first, then the externally held reservation.
        if let Some(child) = self.child.take() {
            agents.stop(child, env);
        }
        self.release_reservation(env);
        let sent = send_to_directory(
            env,
            self.id,
            Packet::UnregisterMcc {
                item: self.contributed,
            },
        );
        if sent {
            self.state = MccState::Unregistering;
        } else {
            warn!(id = %self.id, "unregistration send failed; contributor shutting down");
            self.state = MccState::Finished;
        }
    }

    fn release_reservation(&mut self, env: &mut AgentEnv<'_>) {
        if let Some(item) = self.reservation.take() {
            if let Err(err) = env.ledger.release(self.node, item) {
                warn!(id = %self.id, %err, "reservation release failed");
            }
        }
    }
}
