//! The outbound transport seam.
//!
//! Agents never own sockets. They hand fully encoded frames to whatever
//! implements [`Transport`] -- the in-process loopback network in tests
//! and single-process clusters, a real TCP layer in a distributed
//! deployment. Sends are fire-and-forget; the boolean return is the only
//! failure signal, and the protocol deliberately has no retry on top of
//! it (a failed send simply leaves the negotiation where it was).

use palaver_types::AgentLocation;

/// Fire-and-forget frame delivery toward remote agents and the directory.
pub trait Transport {
    /// Send an encoded frame to a remote agent's host.
    ///
    /// Returns `false` if the frame could not be handed to the network
    /// (unknown host, connect failure); delivery itself is best-effort.
    fn send_to_agent(&mut self, dest: &AgentLocation, frame: &[u8]) -> bool;

    /// Send an encoded frame to the directory service.
    ///
    /// Returns `false` if the frame could not be handed to the network.
    fn send_to_directory(&mut self, frame: &[u8]) -> bool;
}
