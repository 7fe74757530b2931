//! Multicast petitioner: searches for a contributor of one item.
//!
//! The petitioner asks the directory who supplies the requested item,
//! probes each candidate's position to rank them nearest-first within the
//! travel budget, then proposes to the ranked candidates one at a time.
//! An accepted proposal spawns a unicast petitioner against the
//! contributor's worker; a failed negotiation backtracks to the next
//! candidate until either a deal closes or the candidate/`max_nearest`
//! bounds are exhausted.
//!
//! ```text
//! Init --query sent--> RequestingMccs --candidates--> RequestingPosition
//! RequestingPosition <--answer,next-- AwaitingPosition
//! RequestingPosition --all probed--> IteratingOverMccs
//! IteratingOverMccs --proposal sent--> AwaitingProposalAnswer
//! AwaitingProposalAnswer --approved--> Negotiating
//! AwaitingProposalAnswer --rejected--> IteratingOverMccs
//! Negotiating --child failed--> IteratingOverMccs (next candidate)
//! Negotiating --child agreed--> NegotiationFinished
//! IteratingOverMccs --bounds exhausted--> NegotiationFinished
//! ```
//!
//! Candidates are resolved strictly one at a time; no two probes are in
//! flight together. That trades throughput for the guarantee that a
//! petitioner can never hold two accepted proposals at once.

use tracing::{debug, warn};

use palaver_proto::{Packet, PacketHeader};
use palaver_types::{AgentId, AgentLocation, ItemId, NodeId};

use crate::agent::{send_to_agent, send_to_directory, AgentEnv};
use crate::container::AgentContainer;
use crate::ranking::DistanceRanking;

/// States of the multicast petitioner machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpState {
    /// About to query the directory.
    Init,
    /// Query sent; waiting for the candidate list.
    RequestingMccs,
    /// About to probe the next candidate's position.
    RequestingPosition,
    /// Position probe sent; waiting for the answer.
    AwaitingPosition,
    /// About to propose to the next ranked candidate.
    IteratingOverMccs,
    /// Proposal sent; waiting for the verdict.
    AwaitingProposalAnswer,
    /// A unicast petitioner is negotiating with the accepted candidate.
    Negotiating,
    /// Search concluded (terminal).
    NegotiationFinished,
}

/// The multicast petitioner machine.
#[derive(Debug)]
pub struct Mcp {
    id: AgentId,
    node: NodeId,
    requested: ItemId,
    contributed: ItemId,
    depth: u32,
    traveled: f64,
    state: McpState,
    candidates: Vec<AgentLocation>,
    cursor: usize,
    ranking: DistanceRanking,
    child: Option<AgentId>,
    agreement: bool,
}

impl Mcp {
    pub(crate) const fn new(
        id: AgentId,
        node: NodeId,
        requested: ItemId,
        contributed: ItemId,
        depth: u32,
        traveled: f64,
    ) -> Self {
        Self {
            id,
            node,
            requested,
            contributed,
            depth,
            traveled,
            state: McpState::Init,
            candidates: Vec::new(),
            cursor: 0,
            ranking: DistanceRanking::new(),
            child: None,
            agreement: false,
        }
    }

    /// The agent's id.
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// The node this petitioner searches on behalf of.
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// The item being searched for.
    pub const fn requested(&self) -> ItemId {
        self.requested
    }

    /// The item offered in exchange down the chain.
    pub const fn contributed(&self) -> ItemId {
        self.contributed
    }

    /// Recursion depth of this search (0 for a root petition).
    pub const fn search_depth(&self) -> u32 {
        self.depth
    }

    /// Current state.
    pub const fn state(&self) -> McpState {
        self.state
    }

    /// The ranking built by the position phase (for inspection).
    pub const fn ranking(&self) -> &DistanceRanking {
        &self.ranking
    }

    /// Whether the search has concluded.
    pub const fn negotiation_finished(&self) -> bool {
        matches!(self.state, McpState::NegotiationFinished)
    }

    /// Whether the concluded search found a deal.
    pub const fn negotiation_agreement(&self) -> bool {
        self.agreement
    }

    /// The id of the current child petitioner, if one is running.
    pub const fn child(&self) -> Option<AgentId> {
        self.child
    }

    pub(crate) fn update(&mut self, env: &mut AgentEnv<'_>, agents: &mut AgentContainer) {
        match self.state {
            McpState::Init => {
                self.ranking.clear();
                let sent = send_to_directory(
                    env,
                    self.id,
                    Packet::QueryMccsForItem {
                        item: self.requested,
                    },
                );
                if !sent {
                    // No retry by design: the search simply never
                    // progresses past this point.
                    warn!(id = %self.id, "directory query send failed");
                }
                self.state = McpState::RequestingMccs;
            }
            McpState::RequestingPosition => self.probe_next_position(env),
            McpState::IteratingOverMccs => self.propose_to_next(env, agents),
            McpState::Negotiating => self.poll_child(env, agents),
            McpState::RequestingMccs
            | McpState::AwaitingPosition
            | McpState::AwaitingProposalAnswer
            | McpState::NegotiationFinished => {}
        }
    }

    fn probe_next_position(&mut self, env: &mut AgentEnv<'_>) {
        if let Some(candidate) = self.candidates.get(self.cursor) {
            let dest = candidate.clone();
            if !send_to_agent(env, &dest, self.id, Packet::PositionRequest) {
                warn!(id = %self.id, %dest, "position probe send failed");
            }
            self.state = McpState::AwaitingPosition;
        } else {
            // All candidates probed; start proposing nearest-first.
            self.cursor = 0;
            self.state = McpState::IteratingOverMccs;
        }
    }

    fn propose_to_next(&mut self, env: &mut AgentEnv<'_>, agents: &mut AgentContainer) {
        if self.cursor >= env.policy.max_nearest {
            debug!(id = %self.id, "max nearest bound exhausted");
            self.finish_without_agreement(env, agents);
            return;
        }
        let Some(entry) = self.ranking.get(self.cursor) else {
            debug!(id = %self.id, "ranked candidates exhausted");
            self.finish_without_agreement(env, agents);
            return;
        };
        let Some(candidate) = self.candidates.get(entry.candidate) else {
            warn!(id = %self.id, rank = self.cursor, "ranking points at a missing candidate");
            self.finish_without_agreement(env, agents);
            return;
        };
        let dest = candidate.clone();
        if !send_to_agent(env, &dest, self.id, Packet::NegotiationProposalRequest) {
            warn!(id = %self.id, %dest, "proposal send failed");
        }
        self.state = McpState::AwaitingProposalAnswer;
    }

    fn poll_child(&mut self, env: &mut AgentEnv<'_>, agents: &mut AgentContainer) {
        let Some(child) = self.child else {
            warn!(id = %self.id, "negotiating with no child petitioner; trying next candidate");
            self.advance_cursor();
            self.state = McpState::IteratingOverMccs;
            return;
        };
        match agents.outcome(child) {
            Some(outcome) if outcome.finished => {
                agents.stop(child, env);
                self.child = None;
                if outcome.agreement {
                    self.agreement = true;
                    self.state = McpState::NegotiationFinished;
                    debug!(id = %self.id, item = %self.requested, "petition agreed");
                } else {
                    // Backtrack to the next-nearest candidate.
                    self.advance_cursor();
                    self.state = McpState::IteratingOverMccs;
                }
            }
            Some(_) => {}
            None => {
                warn!(id = %self.id, %child, "child petitioner vanished; trying next candidate");
                self.child = None;
                self.advance_cursor();
                self.state = McpState::IteratingOverMccs;
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
            Packet::ReturnMccsForItem { contributors }
                if matches!(self.state, McpState::RequestingMccs) =>
            {
                debug!(
                    id = %self.id,
                    item = %self.requested,
                    count = contributors.len(),
                    "candidate contributors received"
                );
                self.candidates = contributors.clone();
                self.cursor = 0;
                self.state = McpState::RequestingPosition;
            }
            Packet::PositionAnswer { x, y } if matches!(self.state, McpState::AwaitingPosition) => {
                self.admit_position(env, header, (*x, *y));
            }
            Packet::NegotiationProposalAnswer { approved, ucc }
                if matches!(self.state, McpState::AwaitingProposalAnswer) =>
            {
                if *approved {
                    self.open_negotiation(agents, ucc.clone());
                } else {
                    self.advance_cursor();
                    self.state = McpState::IteratingOverMccs;
                }
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

    fn admit_position(&mut self, env: &mut AgentEnv<'_>, header: &PacketHeader, pos: (i32, i32)) {
        let Some(candidate) = self.candidates.get(self.cursor) else {
            warn!(id = %self.id, "position answer with no candidate under the cursor");
            self.cursor = 0;
            self.state = McpState::IteratingOverMccs;
            return;
        };
        if header.src != candidate.agent {
            // A stale answer from an earlier probe; the one we are
            // waiting for is still in flight.
            warn!(
                id = %self.id,
                from = %header.src,
                expected = %candidate.agent,
                "stale position answer ignored"
            );
            return;
        }
        match env.nodes.get(self.node) {
            Some(node) => {
                let distance = node.distance_to(pos);
                if self.traveled + distance <= env.policy.max_travel_distance {
                    self.ranking.insert(self.cursor, distance);
                } else {
                    debug!(
                        id = %self.id,
                        candidate = %candidate,
                        distance,
                        traveled = self.traveled,
                        "candidate beyond travel budget"
                    );
                }
            }
            None => {
                warn!(id = %self.id, node = %self.node, "own node unknown; candidate skipped");
            }
        }
        self.advance_cursor();
        self.state = McpState::RequestingPosition;
    }

    fn open_negotiation(&mut self, agents: &mut AgentContainer, ucc: AgentLocation) {
        let Some(entry) = self.ranking.get(self.cursor) else {
            warn!(id = %self.id, "proposal answer with no ranked candidate under the cursor");
            self.advance_cursor();
            self.state = McpState::IteratingOverMccs;
            return;
        };
        let traveled = self.traveled + entry.distance;
        match agents.spawn_ucp(
            self.node,
            self.requested,
            self.contributed,
            ucc,
            self.depth,
            traveled,
        ) {
            Ok(child) => {
                self.child = Some(child);
                self.state = McpState::Negotiating;
            }
            Err(err) => {
                warn!(id = %self.id, %err, "petitioner spawn failed; trying next candidate");
                self.advance_cursor();
                self.state = McpState::IteratingOverMccs;
            }
        }
    }

    fn finish_without_agreement(&mut self, env: &mut AgentEnv<'_>, agents: &mut AgentContainer) {
        if let Some(child) = self.child.take() {
            agents.stop(child, env);
        }
        self.agreement = false;
        self.state = McpState::NegotiationFinished;
    }

    fn advance_cursor(&mut self) {
        self.cursor = self.cursor.saturating_add(1);
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

    fn candidate(agent: u16) -> AgentLocation {
        AgentLocation::new(HostAddr::new("10.0.0.2", 8401), AgentId(agent))
    }

    /// Drive a fresh petitioner through the directory phase with the
    /// given candidates.
    fn mcp_with_candidates(
        fx: &mut Fixture,
        agents: &mut AgentContainer,
        candidates: Vec<AgentLocation>,
    ) -> Mcp {
        let mut mcp = Mcp::new(AgentId(0), NodeId(0), ItemId(1), ItemId(0), 0, 0.0);
        mcp.update(&mut fx.env(), agents);
        assert_eq!(mcp.state(), McpState::RequestingMccs);
        mcp.on_packet(
            &mut fx.env(),
            agents,
            &header(PacketKind::ReturnMccsForItem, AgentId::NONE, AgentId(0)),
            &Packet::ReturnMccsForItem {
                contributors: candidates,
            },
        );
        mcp
    }

    fn answer_position(fx: &mut Fixture, agents: &mut AgentContainer, mcp: &mut Mcp, from: u16, pos: (i32, i32)) {
        mcp.update(&mut fx.env(), agents);
        assert_eq!(mcp.state(), McpState::AwaitingPosition);
        mcp.on_packet(
            &mut fx.env(),
            agents,
            &header(PacketKind::PositionAnswer, AgentId(from), AgentId(0)),
            &Packet::PositionAnswer { x: pos.0, y: pos.1 },
        );
    }

    #[test]
    fn candidates_rank_nearest_first() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        let mut agents = AgentContainer::new();
        let mut mcp = mcp_with_candidates(
            &mut fx,
            &mut agents,
            vec![candidate(10), candidate(11), candidate(12)],
        );

        // Distances 7, 2, 5 must rank as candidate indices [1, 2, 0].
        answer_position(&mut fx, &mut agents, &mut mcp, 10, (7, 0));
        answer_position(&mut fx, &mut agents, &mut mcp, 11, (2, 0));
        answer_position(&mut fx, &mut agents, &mut mcp, 12, (5, 0));
        mcp.update(&mut fx.env(), &mut agents); // probe phase done
        mcp.update(&mut fx.env(), &mut agents); // first proposal out
        assert_eq!(mcp.state(), McpState::AwaitingProposalAnswer);

        let order: Vec<usize> = mcp.ranking().iter().map(|e| e.candidate).collect();
        assert_eq!(order, vec![1, 2, 0]);
        // The first proposal goes to the nearest candidate.
        assert_eq!(
            fx.transport.sent.last().map(|(dest, _)| dest.agent),
            Some(AgentId(11))
        );
    }

    #[test]
    fn travel_budget_excludes_distant_candidates() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        fx.policy.max_travel_distance = 4.0;
        let mut agents = AgentContainer::new();
        let mut mcp = mcp_with_candidates(&mut fx, &mut agents, vec![candidate(10)]);

        // Distance 5 > budget 4: the candidate must not be ranked.
        answer_position(&mut fx, &mut agents, &mut mcp, 10, (3, 4));
        assert!(mcp.ranking().is_empty());

        // With nothing ranked the search concludes without agreement.
        mcp.update(&mut fx.env(), &mut agents);
        mcp.update(&mut fx.env(), &mut agents);
        assert!(mcp.negotiation_finished());
        assert!(!mcp.negotiation_agreement());
    }

    #[test]
    fn rejected_proposal_backtracks_to_the_next_candidate() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        let mut agents = AgentContainer::new();
        let mut mcp =
            mcp_with_candidates(&mut fx, &mut agents, vec![candidate(10), candidate(11)]);
        answer_position(&mut fx, &mut agents, &mut mcp, 10, (1, 0));
        answer_position(&mut fx, &mut agents, &mut mcp, 11, (2, 0));
        mcp.update(&mut fx.env(), &mut agents); // probe phase done
        mcp.update(&mut fx.env(), &mut agents); // proposal to nearest out

        mcp.on_packet(
            &mut fx.env(),
            &mut agents,
            &header(PacketKind::NegotiationProposalAnswer, AgentId(10), AgentId(0)),
            &Packet::NegotiationProposalAnswer {
                approved: false,
                ucc: AgentLocation::unspecified(),
            },
        );
        assert_eq!(mcp.state(), McpState::IteratingOverMccs);

        // Next tick proposes to the second-nearest candidate.
        mcp.update(&mut fx.env(), &mut agents);
        assert_eq!(
            fx.transport.sent.last().map(|(dest, _)| dest.agent),
            Some(AgentId(11))
        );
    }

    #[test]
    fn approved_proposal_spawns_a_unicast_petitioner() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        let mut agents = AgentContainer::new();
        let mut mcp = mcp_with_candidates(&mut fx, &mut agents, vec![candidate(10)]);
        answer_position(&mut fx, &mut agents, &mut mcp, 10, (3, 4));
        mcp.update(&mut fx.env(), &mut agents); // probe phase done
        mcp.update(&mut fx.env(), &mut agents); // proposal out

        let ucc = AgentLocation::new(HostAddr::new("10.0.0.2", 8401), AgentId(77));
        mcp.on_packet(
            &mut fx.env(),
            &mut agents,
            &header(PacketKind::NegotiationProposalAnswer, AgentId(10), AgentId(0)),
            &Packet::NegotiationProposalAnswer {
                approved: true,
                ucc,
            },
        );
        assert_eq!(mcp.state(), McpState::Negotiating);
        assert_eq!(agents.len(), 1);
    }

    #[test]
    fn max_nearest_bounds_the_proposal_round() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        fx.policy.max_nearest = 0;
        let mut agents = AgentContainer::new();
        let mut mcp = mcp_with_candidates(&mut fx, &mut agents, vec![candidate(10)]);
        answer_position(&mut fx, &mut agents, &mut mcp, 10, (1, 0));

        mcp.update(&mut fx.env(), &mut agents);
        mcp.update(&mut fx.env(), &mut agents);
        assert!(mcp.negotiation_finished());
        assert!(!mcp.negotiation_agreement());
    }

    #[test]
    fn empty_candidate_list_concludes_without_agreement() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        let mut agents = AgentContainer::new();
        let mut mcp = mcp_with_candidates(&mut fx, &mut agents, Vec::new());

        mcp.update(&mut fx.env(), &mut agents); // probe phase: nothing to probe
        mcp.update(&mut fx.env(), &mut agents); // iteration: nothing ranked
        assert!(mcp.negotiation_finished());
        assert!(!mcp.negotiation_agreement());
    }

    #[test]
    fn stale_position_answer_is_ignored() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        let mut agents = AgentContainer::new();
        let mut mcp = mcp_with_candidates(&mut fx, &mut agents, vec![candidate(10)]);
        mcp.update(&mut fx.env(), &mut agents);

        // Answer from an agent we never probed.
        mcp.on_packet(
            &mut fx.env(),
            &mut agents,
            &header(PacketKind::PositionAnswer, AgentId(99), AgentId(0)),
            &Packet::PositionAnswer { x: 1, y: 1 },
        );
        assert_eq!(mcp.state(), McpState::AwaitingPosition);
        assert!(mcp.ranking().is_empty());
    }

    #[test]
    fn unexpected_packet_leaves_state_and_children_unchanged() {
        let mut fx = Fixture::new().with_node(Node::new(NodeId(0), 0, 0));
        let mut agents = AgentContainer::new();
        let mut mcp = mcp_with_candidates(&mut fx, &mut agents, vec![candidate(10)]);

        mcp.on_packet(
            &mut fx.env(),
            &mut agents,
            &header(PacketKind::SendConstraintResponse, AgentId(10), AgentId(0)),
            &Packet::SendConstraintResponse,
        );
        assert_eq!(mcp.state(), McpState::RequestingPosition);
        assert_eq!(mcp.child(), None);
        assert!(agents.is_empty());
    }
}
