//! The cluster runtime: nodes, agents, ledger, and the step loop.
//!
//! One cluster is one host in the network: it owns the nodes spawned on
//! this process, the container holding their agent trees, and the shared
//! admission ledger. Everything is advanced from a single execution
//! context -- [`Cluster::step`] routes queued inbound frames to their
//! destination agents and then gives every agent one `update` tick, so
//! state transitions never race within a cluster.
//!
//! The cluster never moves items between nodes. A concluded negotiation
//! is surfaced through [`Cluster::outcome`] and the contributor's
//! `deal_concluded` flag; acting on it is the embedding application's
//! decision.

use tracing::warn;

use palaver_agents::{
    Agent, AgentContainer, AgentEnv, NegotiationOutcome, NegotiationPolicy,
};
use palaver_ledger::AdmissionLedger;
use palaver_proto::Frame;
use palaver_types::{AgentId, HostAddr, ItemId, NodeId};
use palaver_world::NodeMap;

use crate::loopback::{HostTransport, LoopbackNetwork};
use crate::ClusterError;

/// A host's worth of nodes and negotiation agents.
#[derive(Debug)]
pub struct Cluster {
    host: HostAddr,
    nodes: NodeMap,
    policy: NegotiationPolicy,
    agents: AgentContainer,
    ledger: AdmissionLedger,
}

impl Cluster {
    /// Create a cluster hosting the given nodes, reachable at `host`.
    pub const fn new(host: HostAddr, nodes: NodeMap, policy: NegotiationPolicy) -> Self {
        Self {
            host,
            nodes,
            policy,
            agents: AgentContainer::new(),
            ledger: AdmissionLedger::new(),
        }
    }

    /// The host address this cluster's agents are reachable at.
    pub const fn host(&self) -> &HostAddr {
        &self.host
    }

    /// The nodes hosted here (read-only).
    pub const fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    /// The shared admission ledger (for auditing).
    pub const fn ledger(&self) -> &AdmissionLedger {
        &self.ledger
    }

    /// The agent container (for inspection).
    pub const fn agents(&self) -> &AgentContainer {
        &self.agents
    }

    /// Advertise a node's capability to supply an item.
    ///
    /// Spawns a multicast contributor that registers with the directory
    /// on its first tick.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::UnknownNode`] for nodes this cluster does
    /// not host, or an agent error if the id space is exhausted.
    pub fn spawn_contribution(
        &mut self,
        node: NodeId,
        contributed: ItemId,
        constraint: ItemId,
    ) -> Result<AgentId, ClusterError> {
        if self.nodes.get(node).is_none() {
            return Err(ClusterError::UnknownNode(node));
        }
        Ok(self.agents.spawn_mcc(node, contributed, constraint)?)
    }

    /// Start a root search for an item on behalf of a node.
    ///
    /// The petitioner starts at depth zero with no distance traveled;
    /// `contributed` is what the node offers in exchange down the chain.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::UnknownNode`] for nodes this cluster does
    /// not host, or an agent error if the id space is exhausted.
    pub fn spawn_petition(
        &mut self,
        node: NodeId,
        requested: ItemId,
        contributed: ItemId,
    ) -> Result<AgentId, ClusterError> {
        if self.nodes.get(node).is_none() {
            return Err(ClusterError::UnknownNode(node));
        }
        Ok(self.agents.spawn_mcp(node, requested, contributed, 0, 0.0)?)
    }

    /// A root agent's negotiation result, if the agent still exists.
    pub fn outcome(&self, id: AgentId) -> Option<NegotiationOutcome> {
        self.agents.outcome(id)
    }

    /// Look an agent up for inspection.
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Deliver queued frames and advance every agent by one tick.
    pub fn step(&mut self, net: &mut LoopbackNetwork) {
        let host = self.host.clone();
        for delivery in net.drain(&host) {
            match Frame::decode(&delivery.bytes) {
                Ok(frame) => {
                    let mut transport = HostTransport::new(net, host.clone());
                    let mut env = AgentEnv {
                        nodes: &self.nodes,
                        ledger: &mut self.ledger,
                        policy: &self.policy,
                        transport: &mut transport,
                        local_host: &self.host,
                    };
                    self.agents.deliver(&mut env, &delivery.origin, &frame);
                }
                Err(err) => {
                    warn!(%err, origin = %delivery.origin, "undecodable frame dropped");
                }
            }
        }

        let mut transport = HostTransport::new(net, host);
        let mut env = AgentEnv {
            nodes: &self.nodes,
            ledger: &mut self.ledger,
            policy: &self.policy,
            transport: &mut transport,
            local_host: &self.host,
        };
        self.agents.update_all(&mut env);
    }

    /// Synchronously stop an agent and its whole descendant tree.
    ///
    /// Contributors unregister gracefully (they need further ticks to
    /// complete); every other kind is gone when this returns.
    pub fn stop_agent(&mut self, id: AgentId, net: &mut LoopbackNetwork) {
        let mut transport = HostTransport::new(net, self.host.clone());
        let mut env = AgentEnv {
            nodes: &self.nodes,
            ledger: &mut self.ledger,
            policy: &self.policy,
            transport: &mut transport,
            local_host: &self.host,
        };
        self.agents.stop(id, &mut env);
    }
}
