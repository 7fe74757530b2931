//! Packet kinds, headers, payloads, and frame encoding.
//!
//! A frame on the wire is the header (kind tag, source agent id,
//! destination agent id) followed by the kind-specific payload. A
//! destination of [`AgentId::NONE`] addresses the directory service
//! rather than an agent. Field order and widths are fixed by
//! `docs/protocol.md`; both sides must agree byte-for-byte.

use palaver_types::{AgentId, AgentLocation, HostAddr, ItemId};

use crate::wire::{WireError, WireReader, WireWriter};

// ---------------------------------------------------------------------------
// Packet kind
// ---------------------------------------------------------------------------

/// Enumerated packet kinds, one per message in the protocol.
///
/// The discriminant is the one-byte tag that leads every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PacketKind {
    /// Contributor -> directory: advertise capability to supply an item.
    RegisterMcc = 0,
    /// Directory -> contributor: registration acknowledged.
    RegisterMccAck = 1,
    /// Contributor -> directory: retract a registration.
    UnregisterMcc = 2,
    /// Directory -> contributor: retraction acknowledged.
    UnregisterMccAck = 3,
    /// Petitioner -> directory: who supplies this item?
    QueryMccsForItem = 4,
    /// Directory -> petitioner: current registrants for the item.
    ReturnMccsForItem = 5,
    /// Petitioner -> contributor: where are you?
    PositionRequest = 6,
    /// Contributor -> petitioner: node coordinates.
    PositionAnswer = 7,
    /// Petitioner -> contributor: will you negotiate with me?
    NegotiationProposalRequest = 8,
    /// Contributor -> petitioner: proposal verdict plus the worker address.
    NegotiationProposalAnswer = 9,
    /// Unicast petitioner -> unicast contributor: ask for the item.
    RequestItem = 10,
    /// Unicast contributor -> unicast petitioner: the item's price.
    RequestItemResponse = 11,
    /// Unicast petitioner -> unicast contributor: final answer.
    SendConstraint = 12,
    /// Unicast contributor -> unicast petitioner: transaction closed.
    SendConstraintResponse = 13,
}

impl PacketKind {
    /// The one-byte wire tag for this kind.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Decode a wire tag into a packet kind.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnknownKind`] for tags no packet uses.
    pub const fn from_tag(tag: u8) -> Result<Self, WireError> {
        match tag {
            0 => Ok(Self::RegisterMcc),
            1 => Ok(Self::RegisterMccAck),
            2 => Ok(Self::UnregisterMcc),
            3 => Ok(Self::UnregisterMccAck),
            4 => Ok(Self::QueryMccsForItem),
            5 => Ok(Self::ReturnMccsForItem),
            6 => Ok(Self::PositionRequest),
            7 => Ok(Self::PositionAnswer),
            8 => Ok(Self::NegotiationProposalRequest),
            9 => Ok(Self::NegotiationProposalAnswer),
            10 => Ok(Self::RequestItem),
            11 => Ok(Self::RequestItemResponse),
            12 => Ok(Self::SendConstraint),
            13 => Ok(Self::SendConstraintResponse),
            other => Err(WireError::UnknownKind(other)),
        }
    }
}

impl core::fmt::Display for PacketKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Standard information carried by every frame.
///
/// Besides the packet kind, agents need to know which remote agent sent a
/// message and which local agent should receive it; replies copy `src`
/// into their own `dst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Which kind of packet follows.
    pub kind: PacketKind,
    /// Which agent sent this packet.
    pub src: AgentId,
    /// Which agent is expected to receive it ([`AgentId::NONE`] means the
    /// directory service).
    pub dst: AgentId,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A typed packet: kind plus payload, ready to be framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Advertise capability to supply `item`.
    RegisterMcc {
        /// The item being offered.
        item: ItemId,
    },
    /// Registration acknowledged.
    RegisterMccAck,
    /// Retract the registration for `item`.
    UnregisterMcc {
        /// The item being retracted.
        item: ItemId,
    },
    /// Retraction acknowledged.
    UnregisterMccAck,
    /// Ask the directory who supplies `item`.
    QueryMccsForItem {
        /// The wanted item.
        item: ItemId,
    },
    /// The directory's answer: all current registrants for the item.
    ReturnMccsForItem {
        /// Addresses of contributors currently registered for the item.
        contributors: Vec<AgentLocation>,
    },
    /// Ask a contributor for its node's coordinates.
    PositionRequest,
    /// The contributor's node coordinates.
    PositionAnswer {
        /// Node x coordinate.
        x: i32,
        /// Node y coordinate.
        y: i32,
    },
    /// Ask a contributor to open a negotiation.
    NegotiationProposalRequest,
    /// The contributor's verdict on a proposal.
    NegotiationProposalAnswer {
        /// Whether the proposal was accepted.
        approved: bool,
        /// Address of the spawned unicast contributor; the
        /// [`AgentLocation::unspecified`] placeholder when rejected.
        ucc: AgentLocation,
    },
    /// Ask the unicast contributor for the item.
    RequestItem {
        /// The item being requested.
        item: ItemId,
    },
    /// The item's price: a required constraint item, or [`ItemId::NONE`]
    /// meaning the item is free.
    RequestItemResponse {
        /// The demanded constraint item.
        constraint: ItemId,
    },
    /// The petitioner's final answer.
    SendConstraint {
        /// Whether the petitioner obtained the constraint.
        agreement: bool,
        /// Which item is offered in exchange ([`ItemId::NONE`] if none).
        offered: ItemId,
    },
    /// Closes the transaction.
    SendConstraintResponse,
}

impl Packet {
    /// The kind tag for this packet.
    pub const fn kind(&self) -> PacketKind {
        match self {
            Self::RegisterMcc { .. } => PacketKind::RegisterMcc,
            Self::RegisterMccAck => PacketKind::RegisterMccAck,
            Self::UnregisterMcc { .. } => PacketKind::UnregisterMcc,
            Self::UnregisterMccAck => PacketKind::UnregisterMccAck,
            Self::QueryMccsForItem { .. } => PacketKind::QueryMccsForItem,
            Self::ReturnMccsForItem { .. } => PacketKind::ReturnMccsForItem,
            Self::PositionRequest => PacketKind::PositionRequest,
            Self::PositionAnswer { .. } => PacketKind::PositionAnswer,
            Self::NegotiationProposalRequest => PacketKind::NegotiationProposalRequest,
            Self::NegotiationProposalAnswer { .. } => PacketKind::NegotiationProposalAnswer,
            Self::RequestItem { .. } => PacketKind::RequestItem,
            Self::RequestItemResponse { .. } => PacketKind::RequestItemResponse,
            Self::SendConstraint { .. } => PacketKind::SendConstraint,
            Self::SendConstraintResponse => PacketKind::SendConstraintResponse,
        }
    }

    fn encode_payload(&self, w: &mut WireWriter) -> Result<(), WireError> {
        match self {
            Self::RegisterMcc { item }
            | Self::UnregisterMcc { item }
            | Self::QueryMccsForItem { item }
            | Self::RequestItem { item } => {
                w.put_u16(item.into_inner());
            }
            Self::ReturnMccsForItem { contributors } => {
                w.put_count(contributors.len())?;
                for location in contributors {
                    write_location(w, location)?;
                }
            }
            Self::PositionAnswer { x, y } => {
                w.put_i32(*x);
                w.put_i32(*y);
            }
            Self::NegotiationProposalAnswer { approved, ucc } => {
                w.put_bool(*approved);
                write_location(w, ucc)?;
            }
            Self::RequestItemResponse { constraint } => {
                w.put_u16(constraint.into_inner());
            }
            Self::SendConstraint { agreement, offered } => {
                w.put_bool(*agreement);
                w.put_u16(offered.into_inner());
            }
            Self::RegisterMccAck
            | Self::UnregisterMccAck
            | Self::PositionRequest
            | Self::NegotiationProposalRequest
            | Self::SendConstraintResponse => {}
        }
        Ok(())
    }

    fn decode_payload(kind: PacketKind, r: &mut WireReader<'_>) -> Result<Self, WireError> {
        let packet = match kind {
            PacketKind::RegisterMcc => Self::RegisterMcc {
                item: ItemId(r.get_u16()?),
            },
            PacketKind::RegisterMccAck => Self::RegisterMccAck,
            PacketKind::UnregisterMcc => Self::UnregisterMcc {
                item: ItemId(r.get_u16()?),
            },
            PacketKind::UnregisterMccAck => Self::UnregisterMccAck,
            PacketKind::QueryMccsForItem => Self::QueryMccsForItem {
                item: ItemId(r.get_u16()?),
            },
            PacketKind::ReturnMccsForItem => {
                let count = r.get_count()?;
                let mut contributors = Vec::with_capacity(count);
                for _ in 0..count {
                    contributors.push(read_location(r)?);
                }
                Self::ReturnMccsForItem { contributors }
            }
            PacketKind::PositionRequest => Self::PositionRequest,
            PacketKind::PositionAnswer => Self::PositionAnswer {
                x: r.get_i32()?,
                y: r.get_i32()?,
            },
            PacketKind::NegotiationProposalRequest => Self::NegotiationProposalRequest,
            PacketKind::NegotiationProposalAnswer => Self::NegotiationProposalAnswer {
                approved: r.get_bool()?,
                ucc: read_location(r)?,
            },
            PacketKind::RequestItem => Self::RequestItem {
                item: ItemId(r.get_u16()?),
            },
            PacketKind::RequestItemResponse => Self::RequestItemResponse {
                constraint: ItemId(r.get_u16()?),
            },
            PacketKind::SendConstraint => Self::SendConstraint {
                agreement: r.get_bool()?,
                offered: ItemId(r.get_u16()?),
            },
            PacketKind::SendConstraintResponse => Self::SendConstraintResponse,
        };
        Ok(packet)
    }
}

fn write_location(w: &mut WireWriter, location: &AgentLocation) -> Result<(), WireError> {
    w.put_str(&location.host.ip)?;
    w.put_u16(location.host.port);
    w.put_u16(location.agent.into_inner());
    Ok(())
}

fn read_location(r: &mut WireReader<'_>) -> Result<AgentLocation, WireError> {
    let ip = r.get_str()?;
    let port = r.get_u16()?;
    let agent = AgentId(r.get_u16()?);
    Ok(AgentLocation::new(HostAddr::new(ip, port), agent))
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A complete message: addressing plus typed payload.
///
/// [`encode`](Self::encode) and [`decode`](Self::decode) are exact
/// inverses; decode rejects unknown tags, truncated payloads, and
/// trailing bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The sending agent.
    pub src: AgentId,
    /// The receiving agent, or [`AgentId::NONE`] for the directory.
    pub dst: AgentId,
    /// The typed payload.
    pub packet: Packet,
}

impl Frame {
    /// Build a frame addressed to a specific agent.
    pub const fn new(src: AgentId, dst: AgentId, packet: Packet) -> Self {
        Self { src, dst, packet }
    }

    /// Build a frame addressed to the directory service.
    pub const fn to_directory(src: AgentId, packet: Packet) -> Self {
        Self {
            src,
            dst: AgentId::NONE,
            packet,
        }
    }

    /// The header as it appears on the wire.
    pub const fn header(&self) -> PacketHeader {
        PacketHeader {
            kind: self.packet.kind(),
            src: self.src,
            dst: self.dst,
        }
    }

    /// Encode the frame to wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::LengthOverflow`] if a string or list exceeds
    /// its `u16` prefix. No other failure is possible on encode.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = WireWriter::new();
        w.put_u8(self.packet.kind().tag());
        w.put_u16(self.src.into_inner());
        w.put_u16(self.dst.into_inner());
        self.packet.encode_payload(&mut w)?;
        Ok(w.into_bytes())
    }

    /// Decode a frame from wire bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] for unknown kind tags, truncated or
    /// malformed payloads, and trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(bytes);
        let kind = PacketKind::from_tag(r.get_u8()?)?;
        let src = AgentId(r.get_u16()?);
        let dst = AgentId(r.get_u16()?);
        let packet = Packet::decode_payload(kind, &mut r)?;
        r.finish()?;
        Ok(Self { src, dst, packet })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(frame: &Frame) -> Option<Frame> {
        frame.encode().ok().and_then(|b| Frame::decode(&b).ok())
    }

    #[test]
    fn contributor_list_round_trips() {
        let frame = Frame::new(
            AgentId::NONE,
            AgentId(4),
            Packet::ReturnMccsForItem {
                contributors: vec![
                    AgentLocation::new(HostAddr::new("10.0.0.1", 8401), AgentId(1)),
                    AgentLocation::new(HostAddr::new("10.0.0.2", 8401), AgentId(9)),
                ],
            },
        );
        assert_eq!(round_trip(&frame).as_ref(), Some(&frame));
    }

    #[test]
    fn proposal_answer_round_trips_including_rejection() {
        let accepted = Frame::new(
            AgentId(2),
            AgentId(4),
            Packet::NegotiationProposalAnswer {
                approved: true,
                ucc: AgentLocation::new(HostAddr::new("10.0.0.1", 8401), AgentId(11)),
            },
        );
        let rejected = Frame::new(
            AgentId(2),
            AgentId(4),
            Packet::NegotiationProposalAnswer {
                approved: false,
                ucc: AgentLocation::unspecified(),
            },
        );
        assert_eq!(round_trip(&accepted).as_ref(), Some(&accepted));
        assert_eq!(round_trip(&rejected).as_ref(), Some(&rejected));
    }

    #[test]
    fn directory_frames_carry_the_null_destination() {
        let frame = Frame::to_directory(AgentId(3), Packet::RegisterMcc { item: ItemId(7) });
        let bytes = frame.encode().ok();
        let decoded = bytes.as_deref().and_then(|b| Frame::decode(b).ok());
        assert!(decoded.is_some_and(|f| f.dst.is_none()));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(
            Frame::decode(&[200, 0, 0, 0, 0]),
            Err(WireError::UnknownKind(200))
        );
    }

    #[test]
    fn truncated_payload_is_rejected() {
        // RequestItem header promising a u16 item that is not there.
        let bytes = [PacketKind::RequestItem.tag(), 1, 0, 2, 0];
        assert!(matches!(
            Frame::decode(&bytes),
            Err(WireError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let frame = Frame::new(AgentId(1), AgentId(2), Packet::PositionRequest);
        let mut bytes = frame.encode().unwrap_or_default();
        bytes.push(0);
        assert_eq!(Frame::decode(&bytes), Err(WireError::TrailingBytes(1)));
    }

    #[test]
    fn every_kind_survives_the_tag_round_trip() {
        for tag in 0..=13u8 {
            let kind = PacketKind::from_tag(tag).ok();
            assert_eq!(kind.map(PacketKind::tag), Some(tag));
        }
        assert!(PacketKind::from_tag(14).is_err());
    }
}
