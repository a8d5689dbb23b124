//! src/engine/protocol.rs
//!
//! Pure protocol policy: how long a rumor stays infectious, how probe sweeps
//! are ordered, and how gossip targets are sampled. Isolating these makes
//! the policy easy to test and reason about.

use crate::domain::NodeId;
use rand::seq::SliceRandom;
use rand::thread_rng;

/// Number of gossip rounds a fresh broadcast survives: `max(1, ⌊2·ln(n)⌋)`
/// for a table of `n` peers. The floor of one round keeps small clusters
/// disseminating at all.
pub fn gossip_rounds(num_peers: usize) -> u32 {
    if num_peers == 0 {
        return 1;
    }
    let rounds = (2.0 * (num_peers as f64).ln()) as u32;
    rounds.max(1)
}

/// A fresh uniformly random permutation of the peer list, seeding one probe
/// sweep.
pub fn shuffle_sweep(peers: &[NodeId]) -> Vec<NodeId> {
    let mut sweep = peers.to_vec();
    sweep.shuffle(&mut thread_rng());
    sweep
}

/// Selects up to `fan_out` random peers to send a message to, optionally
/// excluding one datagram port (the peer a message is about should not be
/// asked about itself).
pub fn select_targets(
    peers: &[NodeId],
    fan_out: usize,
    exclude_datagram_port: Option<u16>,
) -> Vec<NodeId> {
    let mut rng = thread_rng();
    peers
        .iter()
        .filter(|p| Some(p.datagram_port) != exclude_datagram_port)
        .collect::<Vec<_>>()
        .choose_multiple(&mut rng, fan_out)
        .map(|p| **p)
        .collect()
}
