//! Shared test fixtures for the agent state machine tests.

use palaver_ledger::AdmissionLedger;
use palaver_proto::{Frame, PacketHeader, PacketKind};
use palaver_types::{AgentId, AgentLocation, HostAddr};
use palaver_world::{Node, NodeMap};

use crate::agent::AgentEnv;
use crate::config::NegotiationPolicy;
use crate::transport::Transport;

/// Transport stub that decodes and records every outbound frame.
#[derive(Default)]
pub(crate) struct Recorder {
    /// Frames sent to agents, with their destinations.
    pub sent: Vec<(AgentLocation, Frame)>,
    /// Frames sent to the directory.
    pub directory: Vec<Frame>,
    /// When set, every send reports failure (frames are still recorded).
    pub fail_all: bool,
}

impl Recorder {
    /// Kinds of all agent-bound frames, in send order.
    pub fn sent_kinds(&self) -> Vec<PacketKind> {
        self.sent.iter().map(|(_, f)| f.packet.kind()).collect()
    }

    /// The last agent-bound frame, if any.
    pub fn last_sent(&self) -> Option<&Frame> {
        self.sent.last().map(|(_, f)| f)
    }
}

impl Transport for Recorder {
    fn send_to_agent(&mut self, dest: &AgentLocation, frame: &[u8]) -> bool {
        if let Ok(decoded) = Frame::decode(frame) {
            self.sent.push((dest.clone(), decoded));
        }
        !self.fail_all
    }

    fn send_to_directory(&mut self, frame: &[u8]) -> bool {
        if let Ok(decoded) = Frame::decode(frame) {
            self.directory.push(decoded);
        }
        !self.fail_all
    }
}

/// One-stop environment owner for driving a machine by hand.
pub(crate) struct Fixture {
    pub nodes: NodeMap,
    pub ledger: AdmissionLedger,
    pub policy: NegotiationPolicy,
    pub transport: Recorder,
    pub host: HostAddr,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            nodes: NodeMap::new(),
            ledger: AdmissionLedger::new(),
            policy: NegotiationPolicy::default(),
            transport: Recorder::default(),
            host: HostAddr::new("127.0.0.1", 8401),
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        let _ = self.nodes.insert(node);
        self
    }

    pub fn env(&mut self) -> AgentEnv<'_> {
        AgentEnv {
            nodes: &self.nodes,
            ledger: &mut self.ledger,
            policy: &self.policy,
            transport: &mut self.transport,
            local_host: &self.host,
        }
    }
}

/// Build a packet header for a hand-delivered packet.
pub(crate) const fn header(kind: PacketKind, src: AgentId, dst: AgentId) -> PacketHeader {
    PacketHeader { kind, src, dst }
}

/// A remote origin host distinct from the fixture's local host.
pub(crate) fn remote_host() -> HostAddr {
    HostAddr::new("10.0.0.9", 8401)
}
