//! src/wire.rs
//!
//! Wire messages and their encoding. All datagram traffic is carried by a
//! single `GossipMessage` shape; the join handshake uses a dedicated
//! request/reply pair on the stream endpoint.
//!
//! Messages are serialized with bincode's legacy layout: every integer is
//! fixed-width little-endian and enum discriminants are 32-bit, so the
//! encoding is deterministic on both sides of the wire. `JoinRequest` has a
//! fixed size (the gateway reads exactly [`JoinRequest::WIRE_LEN`] bytes);
//! `JoinReply` is framed by the gateway closing the stream after writing.

use crate::domain::{NodeId, PeerStatus};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Receive buffer size for one datagram. A full gossip payload of `CAPACITY`
/// updates stays well under this.
pub const MAX_DATAGRAM_LEN: usize = 4_096;

/// Discriminants are part of the wire format:
/// `GossipUpdate = 0, Probe = 1, RequestProbe = 2, AckProbe = 3, NotAPeer = 4`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    GossipUpdate,
    Probe,
    RequestProbe,
    AckProbe,
    NotAPeer,
}

/// One membership update carried by a `GossipUpdate` message. Ports are
/// 32-bit on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerUpdate {
    pub stream_port: i32,
    pub datagram_port: i32,
    pub status: PeerStatus,
}

impl PeerUpdate {
    pub fn new(peer: NodeId, status: PeerStatus) -> Self {
        Self {
            stream_port: i32::from(peer.stream_port),
            datagram_port: i32::from(peer.datagram_port),
            status,
        }
    }

    /// The updated peer's identity, if both ports are in range.
    pub fn node_id(&self) -> Option<NodeId> {
        Some(NodeId::new(
            u16::try_from(self.stream_port).ok()?,
            u16::try_from(self.datagram_port).ok()?,
        ))
    }
}

/// The message shape used for all steady-state datagram traffic.
///
/// `target_datagram_port` is meaningful only for `RequestProbe`;
/// `sender_time` is the sender's Lamport time, carried but not interpreted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GossipMessage {
    pub kind: MessageKind,
    pub cnt_updates: i32,
    pub updates: Vec<PeerUpdate>,
    pub sender_stream_port: i32,
    pub sender_datagram_port: i32,
    pub sender_time: i32,
    pub target_datagram_port: i32,
}

impl GossipMessage {
    fn base(kind: MessageKind, sender: NodeId) -> Self {
        Self {
            kind,
            cnt_updates: 0,
            updates: Vec::new(),
            sender_stream_port: i32::from(sender.stream_port),
            sender_datagram_port: i32::from(sender.datagram_port),
            sender_time: 0,
            target_datagram_port: -1,
        }
    }

    pub fn update(sender: NodeId, sender_time: i32, updates: Vec<PeerUpdate>) -> Self {
        Self {
            cnt_updates: updates.len() as i32,
            updates,
            sender_time,
            ..Self::base(MessageKind::GossipUpdate, sender)
        }
    }

    pub fn probe(sender: NodeId) -> Self {
        Self::base(MessageKind::Probe, sender)
    }

    pub fn ack(sender: NodeId) -> Self {
        Self::base(MessageKind::AckProbe, sender)
    }

    /// An ack forwarded on behalf of `target` to an indirect-probe requestor.
    /// The target is named as the sender so that the requestor's ack matching
    /// cannot tell a relayed ack from a direct one.
    pub fn relayed_ack(target_datagram_port: u16) -> Self {
        Self {
            sender_datagram_port: i32::from(target_datagram_port),
            ..Self::base(MessageKind::AckProbe, NodeId::new(0, 0))
        }
    }

    pub fn request_probe(sender: NodeId, sender_time: i32, target_datagram_port: u16) -> Self {
        Self {
            sender_time,
            target_datagram_port: i32::from(target_datagram_port),
            ..Self::base(MessageKind::RequestProbe, sender)
        }
    }

    pub fn not_a_peer(sender: NodeId) -> Self {
        Self::base(MessageKind::NotAPeer, sender)
    }

    pub fn sender_datagram_port(&self) -> Option<u16> {
        u16::try_from(self.sender_datagram_port).ok()
    }

    pub fn target_datagram_port(&self) -> Option<u16> {
        u16::try_from(self.target_datagram_port).ok()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// First half of the join handshake: the joiner announces its identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub stream_port: i32,
    pub datagram_port: i32,
}

impl JoinRequest {
    /// Encoded size: two fixed-width 32-bit integers.
    pub const WIRE_LEN: usize = 8;

    pub fn new(joiner: NodeId) -> Self {
        Self {
            stream_port: i32::from(joiner.stream_port),
            datagram_port: i32::from(joiner.datagram_port),
        }
    }

    pub fn node_id(&self) -> Option<NodeId> {
        Some(NodeId::new(
            u16::try_from(self.stream_port).ok()?,
            u16::try_from(self.datagram_port).ok()?,
        ))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// A peer's two ports, as carried by `JoinReply`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortPair {
    pub stream_port: i32,
    pub datagram_port: i32,
}

/// Second half of the join handshake: the gateway's current peer list, with
/// the gateway itself appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReply {
    pub num_peers: i32,
    pub peers: Vec<PortPair>,
}

impl JoinReply {
    pub fn new(peers: &[NodeId], gateway: NodeId) -> Self {
        let peers: Vec<PortPair> = peers
            .iter()
            .chain(std::iter::once(&gateway))
            .map(|p| PortPair {
                stream_port: i32::from(p.stream_port),
                datagram_port: i32::from(p.datagram_port),
            })
            .collect();
        Self { num_peers: peers.len() as i32, peers }
    }

    /// The announced peers with in-range ports, capped at `num_peers`.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let announced = usize::try_from(self.num_peers).unwrap_or(0);
        self.peers
            .iter()
            .take(announced)
            .filter_map(|p| {
                Some(NodeId::new(
                    u16::try_from(p.stream_port).ok()?,
                    u16::try_from(p.datagram_port).ok()?,
                ))
            })
            .collect()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

// --- Unit Tests ---
