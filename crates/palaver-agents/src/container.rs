//! The arena that owns every live agent on one cluster.
//!
//! Agents are stored by id in a map; "destroy" means remove-and-drop, so
//! a stale child reference can never dangle -- it just stops resolving.
//! The container also owns the id allocator: ids are handed out
//! monotonically and never reused within one container's lifetime.
//!
//! # Update discipline
//!
//! Handlers receive both the environment and the container (to poll,
//! spawn, and stop other agents). To make that borrow-safe, the agent
//! being advanced is taken out of the map for the duration of the call
//! and reinserted afterwards unless it reported itself defunct. An agent
//! therefore never observes itself through the container.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use palaver_proto::Frame;
use palaver_types::{AgentId, AgentLocation, HostAddr, ItemId, NodeId};

use crate::agent::{Agent, AgentEnv, NegotiationOutcome};
use crate::mcc::Mcc;
use crate::mcp::Mcp;
use crate::ucc::Ucc;
use crate::ucp::Ucp;
use crate::AgentError;

/// Owns and advances every live agent on one cluster.
#[derive(Debug, Default)]
pub struct AgentContainer {
    agents: BTreeMap<AgentId, Agent>,
    next_id: u16,
}

impl AgentContainer {
    /// Create an empty container.
    pub const fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
            next_id: 0,
        }
    }

    fn allocate(&mut self) -> Result<AgentId, AgentError> {
        let raw = self.next_id;
        // u16::MAX is the null sentinel and must never be handed out.
        if raw == u16::MAX {
            return Err(AgentError::IdSpaceExhausted);
        }
        self.next_id = raw.saturating_add(1);
        Ok(AgentId(raw))
    }

    /// Spawn a multicast contributor for a node.
    pub fn spawn_mcc(
        &mut self,
        node: NodeId,
        contributed: ItemId,
        constraint: ItemId,
    ) -> Result<AgentId, AgentError> {
        let id = self.allocate()?;
        debug!(%id, %node, %contributed, %constraint, "spawning mcc");
        self.agents
            .insert(id, Agent::Mcc(Mcc::new(id, node, contributed, constraint)));
        Ok(id)
    }

    /// Spawn a unicast contributor for one accepted proposal.
    pub fn spawn_ucc(
        &mut self,
        node: NodeId,
        contributed: ItemId,
        constraint: ItemId,
    ) -> Result<AgentId, AgentError> {
        let id = self.allocate()?;
        debug!(%id, %node, %contributed, %constraint, "spawning ucc");
        self.agents
            .insert(id, Agent::Ucc(Ucc::new(id, node, contributed, constraint)));
        Ok(id)
    }

    /// Spawn a multicast petitioner searching for an item.
    ///
    /// `depth` and `traveled` are the search budget consumed so far; the
    /// cluster passes zero for a root petition, a unicast petitioner
    /// passes its own budget plus one level when recursing.
    pub fn spawn_mcp(
        &mut self,
        node: NodeId,
        requested: ItemId,
        contributed: ItemId,
        depth: u32,
        traveled: f64,
    ) -> Result<AgentId, AgentError> {
        let id = self.allocate()?;
        debug!(%id, %node, %requested, depth, traveled, "spawning mcp");
        self.agents.insert(
            id,
            Agent::Mcp(Mcp::new(id, node, requested, contributed, depth, traveled)),
        );
        Ok(id)
    }

    /// Spawn a unicast petitioner bound to a remote worker's address.
    pub fn spawn_ucp(
        &mut self,
        node: NodeId,
        requested: ItemId,
        contributed: ItemId,
        ucc: AgentLocation,
        depth: u32,
        traveled: f64,
    ) -> Result<AgentId, AgentError> {
        let id = self.allocate()?;
        debug!(%id, %node, %requested, %ucc, depth, traveled, "spawning ucp");
        self.agents.insert(
            id,
            Agent::Ucp(Ucp::new(id, node, requested, contributed, ucc, depth, traveled)),
        );
        Ok(id)
    }

    /// Look an agent up by id.
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// A child's negotiation result, if the child still exists.
    pub fn outcome(&self, id: AgentId) -> Option<NegotiationOutcome> {
        self.agents.get(&id).map(|agent| NegotiationOutcome {
            finished: agent.negotiation_finished(),
            agreement: agent.negotiation_agreement(),
        })
    }

    /// Number of live agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agent is alive.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Ids of all live agents, ascending.
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    /// Advance every agent by one tick.
    ///
    /// Agents spawned during the pass get their first update on the next
    /// tick; agents stopped during the pass are simply skipped.
    pub fn update_all(&mut self, env: &mut AgentEnv<'_>) {
        for id in self.ids() {
            let Some(mut agent) = self.agents.remove(&id) else {
                continue;
            };
            agent.update(env, self);
            if agent.defunct() {
                debug!(%id, kind = agent.kind_name(), "agent retired");
            } else {
                self.agents.insert(id, agent);
            }
        }
    }

    /// Route one decoded frame to its destination agent.
    ///
    /// Frames for agents that no longer exist are logged and dropped --
    /// late responses to a torn-down negotiation are expected traffic,
    /// not an error.
    pub fn deliver(&mut self, env: &mut AgentEnv<'_>, origin: &HostAddr, frame: &Frame) {
        let id = frame.dst;
        let Some(mut agent) = self.agents.remove(&id) else {
            warn!(%id, packet = %frame.packet.kind(), "packet for unknown agent dropped");
            return;
        };
        let header = frame.header();
        agent.on_packet(env, self, origin, &header, &frame.packet);
        self.agents.insert(id, agent);
    }

    /// Synchronously stop an agent and every descendant it owns.
    ///
    /// Safe to call with an id that no longer resolves (teardown paths
    /// may race with normal completion); in that case nothing happens.
    /// Contributors (`Mcc`) shut down gracefully -- they stay in the
    /// arena until the directory acknowledges their unregistration --
    /// while every other kind is torn down and dropped on the spot.
    pub fn stop(&mut self, id: AgentId, env: &mut AgentEnv<'_>) {
        let Some(mut agent) = self.agents.remove(&id) else {
            return;
        };
        match &mut agent {
            Agent::Mcc(mcc) => {
                mcc.begin_stop(env, self);
                if !mcc.is_finished() {
                    self.agents.insert(id, agent);
                }
            }
            Agent::Mcp(mcp) => mcp.teardown(env, self),
            Agent::Ucp(ucp) => ucp.teardown(env, self),
            // A unicast contributor owns no children and holds nothing
            // external; dropping it is the whole teardown.
            Agent::Ucc(_) => {}
        }
    }
}
