//! src/domain.rs
//!
//! Core data structures of the membership protocol: node identities,
//! membership statuses, pending broadcasts, and the normative protocol
//! constants. This module is the single source of truth for the domain model.

use serde::{Deserialize, Serialize};
use std::fmt;

// --- Normative constants ---

/// Upper bound on the peer table and on the pending indirect-request queue.
pub const CAPACITY: usize = 100;

/// Number of peers a gossip or indirect-probe request is sent to per tick.
pub const FAN_OUT: usize = 2;

/// Startup delay before probing and gossiping begin, in milliseconds.
pub const GRACE_PERIOD_MS: u64 = 3_000;

/// Period of one gossip round, in milliseconds.
pub const GOSSIP_PERIOD_MS: u64 = 1_000;

/// Period of one failure-detection cycle, in milliseconds.
pub const PROBE_PERIOD_MS: u64 = 1_000;

/// Period of the peer-table status log, in milliseconds.
pub const STATUS_PERIOD_MS: u64 = 10_000;

/// How many times a listening socket bind is retried before giving up.
pub const BIND_RETRIES: u32 = 5;

/// Delay between bind retries, in milliseconds.
pub const BIND_RETRY_DELAY_MS: u64 = 100;

// --- Domain models ---

/// A node's identity: the port of its join stream endpoint paired with the
/// port of its gossip datagram endpoint. Fixed at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub stream_port: u16,
    pub datagram_port: u16,
}

impl NodeId {
    pub fn new(stream_port: u16, datagram_port: u16) -> Self {
        Self { stream_port, datagram_port }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.stream_port, self.datagram_port)
    }
}

/// The membership change a broadcast disseminates. Wire discriminants are
/// fixed: `Removed = 0`, `Joined = 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerStatus {
    Removed,
    Joined,
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerStatus::Removed => write!(f, "removed"),
            PeerStatus::Joined => write!(f, "joined"),
        }
    }
}

/// A pending membership-change rumor. `remaining_rounds` counts how many more
/// gossip ticks will include it in outgoing messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Broadcast {
    pub peer: NodeId,
    pub status: PeerStatus,
    pub remaining_rounds: u32,
}

// --- Unit Tests ---
