//! Host addresses and remote agent locations.
//!
//! An [`AgentLocation`] is the network address at which a remote agent can
//! be reached: the host it lives on plus its agent id on that host. It is
//! immutable once received from the wire and is the unit of addressing for
//! every cross-host message in the protocol.

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// A network host: ip (or any transport-level host name) plus port.
///
/// The in-process loopback transport uses these as plain routing keys; a
/// real TCP transport would resolve and connect to them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostAddr {
    /// Host ip or name.
    pub ip: String,
    /// Listen port for agent traffic on that host.
    pub port: u16,
}

impl HostAddr {
    /// Create a host address from an ip string and a port.
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }
}

impl core::fmt::Display for HostAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// The address of a remote agent: which host to contact and which agent id
/// to name in the packet header once there.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentLocation {
    /// Host the agent lives on.
    pub host: HostAddr,
    /// The agent's id on that host.
    pub agent: AgentId,
}

impl AgentLocation {
    /// Create a location from a host address and an agent id.
    pub const fn new(host: HostAddr, agent: AgentId) -> Self {
        Self { host, agent }
    }

    /// Placeholder carried by packets whose location field is meaningless
    /// (e.g. a rejected proposal answer still encodes a location slot).
    pub const fn unspecified() -> Self {
        Self {
            host: HostAddr {
                ip: String::new(),
                port: 0,
            },
            agent: AgentId::NONE,
        }
    }

    /// Whether this is the [`unspecified`](Self::unspecified) placeholder.
    pub fn is_unspecified(&self) -> bool {
        self.agent.is_none() && self.host.ip.is_empty()
    }
}

impl core::fmt::Display for AgentLocation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}#{}", self.host, self.agent)
    }
}
