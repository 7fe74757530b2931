//! The in-memory yellow pages directory service.
//!
//! Maps item ids to the locations of contributors currently advertising
//! them. The directory is an ordinary network endpoint: contributors
//! register and unregister with acknowledged packets, petitioners query,
//! and every reply is a normally encoded frame whose source agent id is
//! the null sentinel. The agent layer cannot tell this apart from a
//! remote directory.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use palaver_proto::{Frame, Packet};
use palaver_types::{AgentId, AgentLocation, HostAddr, ItemId};

use crate::loopback::LoopbackNetwork;

/// The directory service: item id to registered contributor locations.
#[derive(Debug)]
pub struct YellowPages {
    host: HostAddr,
    registrations: BTreeMap<ItemId, Vec<AgentLocation>>,
}

impl YellowPages {
    /// Create a directory listening at the given host address.
    pub const fn new(host: HostAddr) -> Self {
        Self {
            host,
            registrations: BTreeMap::new(),
        }
    }

    /// The directory's own address.
    pub const fn host(&self) -> &HostAddr {
        &self.host
    }

    /// Number of contributors currently registered for an item.
    pub fn registrant_count(&self, item: ItemId) -> usize {
        self.registrations.get(&item).map_or(0, Vec::len)
    }

    /// Whether no contributor is registered for anything.
    pub fn is_empty(&self) -> bool {
        self.registrations.values().all(Vec::is_empty)
    }

    /// Drain and handle every frame queued for the directory.
    pub fn pump(&mut self, net: &mut LoopbackNetwork) {
        let host = self.host.clone();
        for delivery in net.drain(&host) {
            match Frame::decode(&delivery.bytes) {
                Ok(frame) => self.handle(net, &delivery.origin, &frame),
                Err(err) => {
                    warn!(%err, origin = %delivery.origin, "undecodable frame dropped");
                }
            }
        }
    }

    fn handle(&mut self, net: &mut LoopbackNetwork, origin: &HostAddr, frame: &Frame) {
        match &frame.packet {
            Packet::RegisterMcc { item } => {
                let location = AgentLocation::new(origin.clone(), frame.src);
                debug!(%item, %location, "contributor registered");
                self.registrations.entry(*item).or_default().push(location);
                self.reply(net, origin, frame.src, Packet::RegisterMccAck);
            }
            Packet::UnregisterMcc { item } => {
                if let Some(locations) = self.registrations.get_mut(item) {
                    locations.retain(|loc| !(loc.agent == frame.src && loc.host == *origin));
                }
                debug!(%item, agent = %frame.src, "contributor unregistered");
                self.reply(net, origin, frame.src, Packet::UnregisterMccAck);
            }
            Packet::QueryMccsForItem { item } => {
                let contributors = self.registrations.get(item).cloned().unwrap_or_default();
                debug!(%item, count = contributors.len(), "item query answered");
                self.reply(
                    net,
                    origin,
                    frame.src,
                    Packet::ReturnMccsForItem { contributors },
                );
            }
            other => {
                warn!(packet = %other.kind(), "directory ignoring packet");
            }
        }
    }

    fn reply(&self, net: &mut LoopbackNetwork, dest: &HostAddr, dst: AgentId, packet: Packet) {
        let frame = Frame::new(AgentId::NONE, dst, packet);
        match frame.encode() {
            Ok(bytes) => {
                if !net.push(&self.host, dest, bytes) {
                    warn!(%dest, "directory reply failed");
                }
            }
            Err(err) => warn!(%err, "directory reply encode failed"),
        }
    }
}
