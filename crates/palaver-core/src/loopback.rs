//! The in-process loopback network.
//!
//! Frames travel between hosts as encoded bytes through per-host queues,
//! so the wire codec runs on every hop exactly as it would over TCP.
//! Delivery is in order per host pair and never drops a frame once
//! accepted; a send to a host that was never registered fails, which is
//! the loopback equivalent of a connect failure.

use std::collections::{BTreeMap, VecDeque};

use tracing::warn;

use palaver_agents::Transport;
use palaver_types::{AgentLocation, HostAddr};

/// One frame in flight: where it physically came from plus its bytes.
///
/// The origin host is what a TCP transport would report as the remote
/// address of the connection the frame arrived on; receivers combine it
/// with the header's source agent id to build reply addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Host the frame was sent from.
    pub origin: HostAddr,
    /// The encoded frame.
    pub bytes: Vec<u8>,
}

/// Per-host frame queues for a single-process deployment.
#[derive(Debug)]
pub struct LoopbackNetwork {
    queues: BTreeMap<HostAddr, VecDeque<Delivery>>,
    directory_host: HostAddr,
}

impl LoopbackNetwork {
    /// Create a network with the directory service listening at the
    /// given host address.
    pub fn new(directory_host: HostAddr) -> Self {
        let mut queues = BTreeMap::new();
        queues.insert(directory_host.clone(), VecDeque::new());
        Self {
            queues,
            directory_host,
        }
    }

    /// The address frames to the directory are routed to.
    pub const fn directory_host(&self) -> &HostAddr {
        &self.directory_host
    }

    /// Make a host reachable.
    pub fn register_host(&mut self, host: HostAddr) {
        self.queues.entry(host).or_default();
    }

    /// Queue a frame for a destination host.
    ///
    /// Returns `false` (the transport-failure signal) if the destination
    /// was never registered.
    pub fn push(&mut self, origin: &HostAddr, dest: &HostAddr, bytes: Vec<u8>) -> bool {
        match self.queues.get_mut(dest) {
            Some(queue) => {
                queue.push_back(Delivery {
                    origin: origin.clone(),
                    bytes,
                });
                true
            }
            None => {
                warn!(%dest, "send to unknown host failed");
                false
            }
        }
    }

    /// Take every frame currently queued for a host, in arrival order.
    pub fn drain(&mut self, host: &HostAddr) -> Vec<Delivery> {
        self.queues
            .get_mut(host)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    /// Whether no frame is in flight anywhere.
    pub fn is_idle(&self) -> bool {
        self.queues.values().all(VecDeque::is_empty)
    }
}

/// [`Transport`] view of the network for one sending host.
///
/// Stamps every outbound frame with the sender's host address so the
/// receiver can build reply locations, exactly as a TCP remote address
/// would.
#[derive(Debug)]
pub struct HostTransport<'a> {
    net: &'a mut LoopbackNetwork,
    local: HostAddr,
}

impl<'a> HostTransport<'a> {
    /// Borrow the network as the given local host.
    pub const fn new(net: &'a mut LoopbackNetwork, local: HostAddr) -> Self {
        Self { net, local }
    }
}

impl Transport for HostTransport<'_> {
    fn send_to_agent(&mut self, dest: &AgentLocation, frame: &[u8]) -> bool {
        self.net.push(&self.local, &dest.host, frame.to_vec())
    }

    fn send_to_directory(&mut self, frame: &[u8]) -> bool {
        let dest = self.net.directory_host().clone();
        self.net.push(&self.local, &dest, frame.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_types::AgentId;

    fn host(ip: &str) -> HostAddr {
        HostAddr::new(ip, 8401)
    }

    #[test]
    fn frames_arrive_in_order_with_their_origin() {
        let mut net = LoopbackNetwork::new(host("directory"));
        net.register_host(host("a"));
        net.register_host(host("b"));

        assert!(net.push(&host("a"), &host("b"), vec![1]));
        assert!(net.push(&host("a"), &host("b"), vec![2]));

        let deliveries = net.drain(&host("b"));
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries.first().map(|d| d.bytes.clone()), Some(vec![1]));
        assert!(deliveries.iter().all(|d| d.origin == host("a")));
        assert!(net.is_idle());
    }

    #[test]
    fn unknown_destination_reports_send_failure() {
        let mut net = LoopbackNetwork::new(host("directory"));
        net.register_host(host("a"));
        assert!(!net.push(&host("a"), &host("nowhere"), vec![0]));
    }

    #[test]
    fn host_transport_routes_to_agents_and_directory() {
        let mut net = LoopbackNetwork::new(host("directory"));
        net.register_host(host("a"));
        net.register_host(host("b"));

        let mut transport = HostTransport::new(&mut net, host("a"));
        let dest = AgentLocation::new(host("b"), AgentId(3));
        assert!(transport.send_to_agent(&dest, &[9]));
        assert!(transport.send_to_directory(&[8]));

        assert_eq!(net.drain(&host("b")).len(), 1);
        assert_eq!(net.drain(&host("directory")).len(), 1);
    }
}
