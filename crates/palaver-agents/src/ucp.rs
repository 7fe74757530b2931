//! Unicast petitioner: one exchange with one remote contributor worker.
//!
//! Spawned by a multicast petitioner once a proposal is accepted, bound
//! to the worker address the contributor returned. The petitioner asks
//! for the item, learns its price, and answers in one of three ways:
//!
//! - the item is free or costs exactly what we contribute: agree;
//! - the price is some other item and depth remains: spawn a child
//!   multicast petitioner to search for it one level deeper and adopt
//!   whatever it concludes;
//! - the depth budget is spent: decline.
//!
//! ```text
//! Init --request sent--> RequestingItem
//! RequestingItem --free or direct swap--> SendingConstraint
//! RequestingItem --constraint, depth left--> ResolvingConstraint
//! ResolvingConstraint --child done--> SendingConstraint
//! SendingConstraint --response--> NegotiationFinished
//! ```
//!
//! Depth and traveled distance are immutable construction parameters;
//! the recursion bumps them by exactly one level and one edge length per
//! spawn, which is what bounds the whole search tree.

use tracing::{debug, warn};

use palaver_proto::{Packet, PacketHeader};
use palaver_types::{AgentId, AgentLocation, ItemId, NodeId};

use crate::agent::{send_to_agent, AgentEnv};
use crate::container::AgentContainer;

/// States of the unicast petitioner machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UcpState {
    /// About to request the item.
    Init,
    /// Request sent; waiting for the price.
    RequestingItem,
    /// A child search for the constraint item is running.
    ResolvingConstraint,
    /// Final answer sent; waiting for the closing response.
    SendingConstraint,
    /// Exchange closed (terminal).
    NegotiationFinished,
}

/// The unicast petitioner machine.
#[derive(Debug)]
pub struct Ucp {
    id: AgentId,
    node: NodeId,
    requested: ItemId,
    contributed: ItemId,
    ucc: AgentLocation,
    depth: u32,
    traveled: f64,
    state: UcpState,
    child: Option<AgentId>,
    agreement: bool,
}

impl Ucp {
    pub(crate) const fn new(
        id: AgentId,
        node: NodeId,
        requested: ItemId,
        contributed: ItemId,
        ucc: AgentLocation,
        depth: u32,
        traveled: f64,
    ) -> Self {
        Self {
            id,
            node,
            requested,
            contributed,
            ucc,
            depth,
            traveled,
            state: UcpState::Init,
            child: None,
            agreement: false,
        }
    }

    /// The agent's id.
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// The node this petitioner negotiates on behalf of.
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// The item being requested from the remote worker.
    pub const fn requested(&self) -> ItemId {
        self.requested
    }

    /// Recursion depth of this exchange.
    pub const fn search_depth(&self) -> u32 {
        self.depth
    }

    /// Cumulative travel distance consumed to reach this worker.
    pub const fn traveled(&self) -> f64 {
        self.traveled
    }

    /// Current state.
    pub const fn state(&self) -> UcpState {
        self.state
    }

    /// Whether the exchange has concluded.
    pub const fn negotiation_finished(&self) -> bool {
        matches!(self.state, UcpState::NegotiationFinished)
    }

    /// Whether the exchange concluded in agreement.
    pub const fn negotiation_agreement(&self) -> bool {
        self.agreement
    }

    /// The id of the current child search, if one is running.
    pub const fn child(&self) -> Option<AgentId> {
        self.child
    }

    pub(crate) fn update(&mut self, env: &mut AgentEnv<'_>, agents: &mut AgentContainer) {
        match self.state {
            UcpState::Init => {
                let sent = send_to_agent(
                    env,
                    &self.ucc,
                    self.id,
                    Packet::RequestItem {
                        item: self.requested,
                    },
                );
                if !sent {
                    // No retry by design; the exchange stalls here.
                    warn!(id = %self.id, ucc = %self.ucc, "item request send failed");
                }
                self.state = UcpState::RequestingItem;
            }
            UcpState::ResolvingConstraint => self.poll_child(env, agents),
            UcpState::RequestingItem
            | UcpState::SendingConstraint
            | UcpState::NegotiationFinished => {}
        }
    }

    fn poll_child(&mut self, env: &mut AgentEnv<'_>, agents: &mut AgentContainer) {
        let Some(child) = self.child else {
            warn!(id = %self.id, "resolving constraint with no child search; declining");
            self.conclude(env, false, ItemId::NONE);
            return;
        };
        match agents.outcome(child) {
            Some(outcome) if outcome.finished => {
                let agreement = outcome.agreement;
                agents.stop(child, env);
                self.child = None;
                self.conclude(env, agreement, self.contributed);
            }
            Some(_) => {}
            None => {
                warn!(id = %self.id, %child, "child search vanished; declining");
                self.child = None;
                self.conclude(env, false, ItemId::NONE);
            }
        }
    }

    pub(crate) fn on_packet(
        &mut self,
        env: &mut AgentEnv<'_>,
        agents: &mut AgentContainer,
        header: &PacketHeader,
        packet: &Packet,
    ) {
        match packet {
            Packet::RequestItemResponse { constraint }
                if matches!(self.state, UcpState::RequestingItem) =>
            {
                if header.src != self.ucc.agent {
                    warn!(
                        id = %self.id,
                        from = %header.src,
                        expected = %self.ucc.agent,
                        "item response from an unexpected worker ignored"
                    );
                    return;
                }
                self.handle_price(env, agents, *constraint);
            }
            Packet::SendConstraintResponse
                if matches!(self.state, UcpState::SendingConstraint) =>
            {
                debug!(id = %self.id, agreement = self.agreement, "exchange closed");
                self.state = UcpState::NegotiationFinished;
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

    fn handle_price(
        &mut self,
        env: &mut AgentEnv<'_>,
        agents: &mut AgentContainer,
        constraint: ItemId,
    ) {
        if constraint.is_none() {
            // The item is free.
            self.conclude(env, true, ItemId::NONE);
            return;
        }
        if constraint == self.contributed {
            // Direct swap: the price is exactly what we carry.
            self.conclude(env, true, self.contributed);
            return;
        }
        let next_depth = self.depth.checked_add(1);
        match next_depth {
            Some(next) if self.depth < env.policy.max_depth => {
                match agents.spawn_mcp(self.node, constraint, self.contributed, next, self.traveled)
                {
                    Ok(child) => {
                        debug!(
                            id = %self.id,
                            %constraint,
                            depth = next,
                            "recursing for constraint item"
                        );
                        self.child = Some(child);
                        self.state = UcpState::ResolvingConstraint;
                    }
                    Err(err) => {
                        warn!(id = %self.id, %err, "constraint search spawn failed; declining");
                        self.conclude(env, false, ItemId::NONE);
                    }
                }
            }
            _ => {
                debug!(id = %self.id, depth = self.depth, "depth budget spent; declining");
                self.conclude(env, false, ItemId::NONE);
            }
        }
    }

    /// Record the outcome and send the final answer to the worker.
    fn conclude(&mut self, env: &mut AgentEnv<'_>, agreement: bool, offered: ItemId) {
        self.agreement = agreement;
        let sent = send_to_agent(
            env,
            &self.ucc,
            self.id,
            Packet::SendConstraint { agreement, offered },
        );
        if !sent {
            warn!(id = %self.id, ucc = %self.ucc, "final answer send failed");
        }
        self.state = UcpState::SendingConstraint;
    }

    /// Tear down the search hierarchy below this petitioner. The
    /// petitioner itself is dropped by the container right after.
    pub(crate) fn teardown(&mut self, env: &mut AgentEnv<'_>, agents: &mut AgentContainer) {
        if let Some(child) = self.child.take() {
            agents.stop(child, env);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{header, Fixture};
    use palaver_proto::PacketKind;
    use palaver_types::HostAddr;
    use palaver_world::Node;

    fn worker() -> AgentLocation {
        AgentLocation::new(HostAddr::new("10.0.0.2", 8401), AgentId(50))
    }

    fn requesting_ucp(fx: &mut Fixture, agents: &mut AgentContainer) -> Ucp {
        let mut ucp = Ucp::new(AgentId(0), NodeId(0), ItemId(1), ItemId(9), worker(), 0, 0.0);
        ucp.update(&mut fx.env(), agents);
        assert_eq!(ucp.state(), UcpState::RequestingItem);
        ucp
    }

    fn price_header() -> PacketHeader {
        header(PacketKind::RequestItemResponse, AgentId(50), AgentId(0))
    }

    #[test]
    fn free_item_is_agreed_immediately() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        let mut agents = AgentContainer::new();
        let mut ucp = requesting_ucp(&mut fx, &mut agents);

        ucp.on_packet(
            &mut fx.env(),
            &mut agents,
            &price_header(),
            &Packet::RequestItemResponse {
                constraint: ItemId::NONE,
            },
        );
        assert_eq!(ucp.state(), UcpState::SendingConstraint);
        assert_eq!(
            fx.transport.last_sent().map(|f| f.packet.clone()),
            Some(Packet::SendConstraint {
                agreement: true,
                offered: ItemId::NONE,
            })
        );

        ucp.on_packet(
            &mut fx.env(),
            &mut agents,
            &header(PacketKind::SendConstraintResponse, AgentId(50), AgentId(0)),
            &Packet::SendConstraintResponse,
        );
        assert!(ucp.negotiation_finished());
        assert!(ucp.negotiation_agreement());
    }

    #[test]
    fn direct_swap_offers_the_contributed_item() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        let mut agents = AgentContainer::new();
        let mut ucp = requesting_ucp(&mut fx, &mut agents);

        // The worker demands exactly what this petitioner contributes.
        ucp.on_packet(
            &mut fx.env(),
            &mut agents,
            &price_header(),
            &Packet::RequestItemResponse {
                constraint: ItemId(9),
            },
        );
        assert_eq!(
            fx.transport.last_sent().map(|f| f.packet.clone()),
            Some(Packet::SendConstraint {
                agreement: true,
                offered: ItemId(9),
            })
        );
        assert!(agents.is_empty());
    }

    #[test]
    fn foreign_constraint_spawns_a_deeper_search() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        let mut agents = AgentContainer::new();
        let mut ucp = requesting_ucp(&mut fx, &mut agents);

        ucp.on_packet(
            &mut fx.env(),
            &mut agents,
            &price_header(),
            &Packet::RequestItemResponse {
                constraint: ItemId(4),
            },
        );
        assert_eq!(ucp.state(), UcpState::ResolvingConstraint);
        assert_eq!(agents.len(), 1);

        let child = ucp.child().unwrap_or(AgentId::NONE);
        let depth = match agents.get(child) {
            Some(crate::agent::Agent::Mcp(mcp)) => mcp.search_depth(),
            _ => u32::MAX,
        };
        assert_eq!(depth, 1);
    }

    #[test]
    fn depth_budget_exhaustion_declines() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        fx.policy.max_depth = 3;
        let mut agents = AgentContainer::new();
        let mut ucp = Ucp::new(AgentId(0), NodeId(0), ItemId(1), ItemId(9), worker(), 3, 0.0);
        ucp.update(&mut fx.env(), &mut agents);

        ucp.on_packet(
            &mut fx.env(),
            &mut agents,
            &price_header(),
            &Packet::RequestItemResponse {
                constraint: ItemId(4),
            },
        );
        assert_eq!(ucp.state(), UcpState::SendingConstraint);
        assert!(agents.is_empty());
        assert_eq!(
            fx.transport.last_sent().map(|f| f.packet.clone()),
            Some(Packet::SendConstraint {
                agreement: false,
                offered: ItemId::NONE,
            })
        );
    }

    #[test]
    fn child_outcome_is_adopted_and_forwarded() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        let mut agents = AgentContainer::new();
        let mut ucp = requesting_ucp(&mut fx, &mut agents);
        ucp.on_packet(
            &mut fx.env(),
            &mut agents,
            &price_header(),
            &Packet::RequestItemResponse {
                constraint: ItemId(4),
            },
        );

        // The child search concludes without agreement: queries go out,
        // but the directory returns nobody, so two ticks exhaust it.
        let mut env = fx.env();
        agents.update_all(&mut env);
        let child = ucp.child().unwrap_or(AgentId::NONE);
        drive_child_to_failure(&mut fx, &mut agents, child);

        ucp.update(&mut fx.env(), &mut agents);
        assert_eq!(ucp.state(), UcpState::SendingConstraint);
        assert!(!ucp.negotiation_agreement());
        assert!(agents.is_empty());
        assert_eq!(
            fx.transport.last_sent().map(|f| f.packet.clone()),
            Some(Packet::SendConstraint {
                agreement: false,
                offered: ItemId(9),
            })
        );
    }

    /// Feed the child petitioner an empty candidate list and tick it to
    /// its failed conclusion.
    fn drive_child_to_failure(fx: &mut Fixture, agents: &mut AgentContainer, child: AgentId) {
        agents.deliver(
            &mut fx.env(),
            &HostAddr::new("127.0.0.1", 8401),
            &palaver_proto::Frame::new(
                AgentId::NONE,
                child,
                Packet::ReturnMccsForItem {
                    contributors: Vec::new(),
                },
            ),
        );
        let mut env = fx.env();
        agents.update_all(&mut env);
        agents.update_all(&mut env);
    }

    #[test]
    fn stop_tears_down_the_child_search() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        let mut agents = AgentContainer::new();
        let mut ucp = requesting_ucp(&mut fx, &mut agents);
        ucp.on_packet(
            &mut fx.env(),
            &mut agents,
            &price_header(),
            &Packet::RequestItemResponse {
                constraint: ItemId(4),
            },
        );
        assert_eq!(agents.len(), 1);

        ucp.teardown(&mut fx.env(), &mut agents);
        assert!(agents.is_empty());
        assert_eq!(ucp.child(), None);
    }

    #[test]
    fn late_price_in_the_wrong_state_is_ignored() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        let mut agents = AgentContainer::new();
        let mut ucp = requesting_ucp(&mut fx, &mut agents);
        ucp.on_packet(
            &mut fx.env(),
            &mut agents,
            &price_header(),
            &Packet::RequestItemResponse {
                constraint: ItemId::NONE,
            },
        );
        let state_before = ucp.state();

        ucp.on_packet(
            &mut fx.env(),
            &mut agents,
            &price_header(),
            &Packet::RequestItemResponse {
                constraint: ItemId(2),
            },
        );
        assert_eq!(ucp.state(), state_before);
        assert!(agents.is_empty());
    }
}
