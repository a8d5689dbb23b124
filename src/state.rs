//! src/state.rs
//!
//! The membership core. A [`Node`] owns every piece of mutable protocol
//! state behind one mutex: the peer table, the broadcast queue, the probe
//! cycle bookkeeping, the pending indirect-probe requests, the grace-period
//! deadline, and the Lamport clock. The services (dispatcher, prober,
//! gossiper, join listener) share the node through an `Arc` and drive it by
//! calling the operations below.
//!
//! Locking discipline: the mutex is never held across an `.await`. The only
//! I/O performed under it is `transport::send_datagram`, which is
//! best-effort on a per-call socket.

use crate::config::Config;
use crate::domain::{Broadcast, NodeId, PeerStatus};
use crate::engine::protocol;
use crate::error::{Error, Result};
use crate::transport;
use crate::wire::{GossipMessage, JoinReply, PeerUpdate};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::time::Instant;

/// One relayed-probe obligation: if `target` acks before `deadline`, tell
/// `requestor` about it.
struct IndirectRequest {
    target: u16,
    requestor: u16,
    deadline: Instant,
}

/// Bookkeeping of one sweep through the peer table. `pending` holds the
/// shuffled remainder of the sweep; targets pop from the back.
#[derive(Default)]
struct ProbeCycle {
    pending: Vec<NodeId>,
    current: Option<NodeId>,
    acked: bool,
}

struct NodeState {
    peers: Vec<NodeId>,
    broadcasts: Vec<Broadcast>,
    probe: ProbeCycle,
    indirect: Vec<IndirectRequest>,
    grace_until: Instant,
    lamport: i32,
}

impl NodeState {
    fn push_broadcast(&mut self, peer: NodeId, status: PeerStatus) {
        let remaining_rounds = protocol::gossip_rounds(self.peers.len());
        self.broadcasts.push(Broadcast { peer, status, remaining_rounds });
    }

    /// Drop queued broadcasts that contradict the current table: a `Removed`
    /// for a peer still present, or a `Joined` for a peer now absent. This
    /// keeps concurrent contradictory rumors from oscillating.
    fn reconcile_broadcasts(&mut self) {
        let peers = &self.peers;
        self.broadcasts.retain(|b| match b.status {
            PeerStatus::Removed => !peers.contains(&b.peer),
            PeerStatus::Joined => peers.contains(&b.peer),
        });
    }

    fn update_member(&mut self, own: NodeId, capacity: usize, peer: NodeId, status: PeerStatus) {
        let present = self.peers.contains(&peer);
        let mutated = match status {
            PeerStatus::Removed if present => {
                self.peers.retain(|p| *p != peer);
                true
            }
            PeerStatus::Joined if !present && peer != own => {
                if self.peers.len() >= capacity {
                    tracing::warn!(peer = %peer, "peer table full, ignoring gossiped join");
                    false
                } else {
                    self.peers.push(peer);
                    true
                }
            }
            _ => false,
        };

        if mutated {
            self.push_broadcast(peer, status);
        }
        self.reconcile_broadcasts();
    }
}

/// A cluster member: fixed identity plus the guarded protocol state.
pub struct Node {
    // Write-once; readable without the lock.
    identity: NodeId,
    config: Config,
    state: Mutex<NodeState>,
}

impl Node {
    pub fn new(identity: NodeId, config: Config) -> Self {
        let grace_until = Instant::now() + config.grace_period();
        Self {
            identity,
            config,
            state: Mutex::new(NodeState {
                peers: Vec::new(),
                broadcasts: Vec::new(),
                probe: ProbeCycle::default(),
                indirect: Vec::new(),
                grace_until,
                lamport: 0,
            }),
        }
    }

    pub fn identity(&self) -> NodeId {
        self.identity
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // --- Membership table ---

    /// Replace the peer table with the given peers and re-arm the grace
    /// deadline. Used on startup (seeds or join reply) and on rejoin.
    pub fn populate(&self, peers: Vec<NodeId>) {
        let mut state = self.state.lock();
        state.peers.clear();
        for peer in peers {
            if peer != self.identity && !state.peers.contains(&peer) {
                state.peers.push(peer);
            }
        }
        state.grace_until = Instant::now() + self.config.grace_period();
        tracing::info!(peers = state.peers.len(), "populated peer table");
    }

    /// Add a peer if absent. Exceeding the table capacity is an error; the
    /// gateway path treats it as fatal.
    pub fn append_member(&self, peer: NodeId) -> Result<()> {
        let mut state = self.state.lock();
        if peer == self.identity || state.peers.contains(&peer) {
            return Ok(());
        }
        if state.peers.len() >= self.config.capacity {
            return Err(Error::PeerCapacity { peer, capacity: self.config.capacity });
        }
        state.peers.push(peer);
        Ok(())
    }

    /// Datagram-port-only membership check used by the dispatcher to detect
    /// strangers.
    pub fn is_peer(&self, datagram_port: u16) -> bool {
        let state = self.state.lock();
        state.peers.iter().any(|p| p.datagram_port == datagram_port)
    }

    /// Idempotent removal.
    pub fn remove_peer(&self, peer: NodeId) {
        let mut state = self.state.lock();
        state.peers.retain(|p| *p != peer);
    }

    pub fn peers(&self) -> Vec<NodeId> {
        self.state.lock().peers.clone()
    }

    /// Stable textual representation of the table, for the status log.
    pub fn snapshot(&self) -> String {
        let state = self.state.lock();
        let listed: Vec<String> = state.peers.iter().map(ToString::to_string).collect();
        format!("{} peers: {}", state.peers.len(), listed.join(", "))
    }

    /// The gateway's answer to a join request: its current peers plus
    /// itself.
    pub fn join_reply(&self) -> JoinReply {
        let state = self.state.lock();
        JoinReply::new(&state.peers, self.identity)
    }

    pub fn remaining_grace(&self) -> std::time::Duration {
        let state = self.state.lock();
        state.grace_until.saturating_duration_since(Instant::now())
    }

    // --- Broadcast queue and gossip ---

    pub fn append_broadcast(&self, peer: NodeId, status: PeerStatus) {
        let mut state = self.state.lock();
        state.push_broadcast(peer, status);
    }

    pub fn queued_broadcasts(&self) -> Vec<Broadcast> {
        self.state.lock().broadcasts.clone()
    }

    /// One gossip round: include every queued broadcast in a single message,
    /// charge each included broadcast one round, purge the exhausted ones,
    /// and send the message to up to `fan_out` random peers. No message is
    /// sent when the queue is empty.
    pub fn gossip_tick(&self) {
        let mut state = self.state.lock();
        if state.broadcasts.is_empty() {
            return;
        }

        // At most `capacity` updates fit one message.
        let included = state.broadcasts.len().min(self.config.capacity);
        let updates: Vec<PeerUpdate> = state.broadcasts[..included]
            .iter()
            .map(|b| PeerUpdate::new(b.peer, b.status))
            .collect();
        for broadcast in &mut state.broadcasts[..included] {
            broadcast.remaining_rounds -= 1;
        }
        state.broadcasts.retain(|b| b.remaining_rounds > 0);

        let message = GossipMessage::update(self.identity, state.lamport, updates);
        for target in protocol::select_targets(&state.peers, self.config.fan_out, None) {
            tracing::debug!(
                peer = %target,
                changes = message.cnt_updates,
                "gossiping changes"
            );
            if let Err(e) = transport::send_datagram(target.datagram_port, &message) {
                tracing::debug!(peer = %target, error = %e, "failed to send gossip");
            }
        }
    }

    /// Ingest one received gossip message: apply every embedded update to
    /// the table, enqueueing matching broadcasts for the ones that changed
    /// it.
    pub fn process_updates(&self, message: &GossipMessage) {
        let mut state = self.state.lock();
        for update in message.updates.iter().take(self.config.capacity) {
            let Some(peer) = update.node_id() else {
                tracing::debug!(?update, "ignoring update with out-of-range ports");
                continue;
            };
            state.update_member(self.identity, self.config.capacity, peer, update.status);
        }
    }

    // --- Probe engine ---

    /// Start one probe: re-seed the sweep if it is exhausted, pop the next
    /// target, and send it a direct probe.
    pub fn probe_next(&self) {
        let mut state = self.state.lock();
        state.probe.current = None;
        state.probe.acked = false;

        if state.probe.pending.is_empty() && !state.peers.is_empty() {
            let sweep = protocol::shuffle_sweep(&state.peers);
            state.probe.pending = sweep;
        }

        if let Some(target) = state.probe.pending.pop() {
            state.probe.current = Some(target);
            tracing::debug!(peer = %target, "probing");
            let message = GossipMessage::probe(self.identity);
            if let Err(e) = transport::send_datagram(target.datagram_port, &message) {
                // A local send failure must not count against the peer.
                tracing::debug!(peer = %target, error = %e, "failed to send probe, assuming alive");
                state.probe.acked = true;
            }
        }
    }

    pub fn current_probe_target(&self) -> Option<NodeId> {
        self.state.lock().probe.current
    }

    /// Record an ack if it names the currently probed target. Direct and
    /// relayed acks are indistinguishable here.
    pub fn check_ack(&self, datagram_port: u16) {
        let mut state = self.state.lock();
        if state.probe.current.map(|t| t.datagram_port) == Some(datagram_port) {
            state.probe.acked = true;
        }
    }

    /// Direct phase expired without an ack: ask up to `fan_out` random peers
    /// (excluding the target itself) to probe on our behalf.
    pub fn request_probes_if_no_ack(&self) {
        let state = self.state.lock();
        let Some(target) = state.probe.current else { return };
        if state.probe.acked {
            return;
        }

        let message =
            GossipMessage::request_probe(self.identity, state.lamport, target.datagram_port);
        for relay in
            protocol::select_targets(&state.peers, self.config.fan_out, Some(target.datagram_port))
        {
            tracing::debug!(relay = %relay, peer = %target, "requesting indirect probe");
            if let Err(e) = transport::send_datagram(relay.datagram_port, &message) {
                tracing::debug!(relay = %relay, error = %e, "failed to send indirect-probe request");
            }
        }
    }

    /// End of the probe cycle: a target that never acked is declared dead,
    /// removed from the table, and broadcast as removed.
    pub fn check_probed(&self) {
        let mut state = self.state.lock();
        let Some(target) = state.probe.current else { return };
        if state.probe.acked {
            tracing::debug!(peer = %target, "found target alive");
            return;
        }

        tracing::info!(peer = %target, "found target dead");
        if state.peers.contains(&target) {
            state.peers.retain(|p| *p != target);
            state.push_broadcast(target, PeerStatus::Removed);
        }
    }

    // --- Indirect-probe relaying ---

    /// Accept a request to probe `target` on behalf of `requestor` and send
    /// the probe. Exceeding the queue capacity is an error; the dispatcher
    /// treats it as fatal.
    pub fn append_request_probe(&self, target: u16, requestor: u16) -> Result<()> {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.indirect.retain(|r| r.deadline > now);
        if state.indirect.len() >= self.config.capacity {
            return Err(Error::IndirectCapacity { capacity: self.config.capacity });
        }

        let deadline = now + self.config.indirect_deadline();
        state.indirect.push(IndirectRequest { target, requestor, deadline });

        tracing::debug!(probed = target, requestor, "probing on behalf of requestor");
        let message = GossipMessage::probe(self.identity);
        if let Err(e) = transport::send_datagram(target, &message) {
            tracing::debug!(probed = target, error = %e, "failed to send relayed probe");
        }
        Ok(())
    }

    /// An ack from `datagram_port` arrived: forward a synthesized ack to
    /// every unexpired requestor waiting on that target, dropping the
    /// answered entries. Expired entries are purged in the same pass.
    pub fn fulfil_request_probes(&self, datagram_port: u16) {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.indirect.retain(|request| {
            if request.deadline <= now {
                return false;
            }
            if request.target != datagram_port {
                return true;
            }
            tracing::info!(
                requestor = request.requestor,
                probed = request.target,
                "acking requestor that target is alive"
            );
            let ack = GossipMessage::relayed_ack(request.target);
            if let Err(e) = transport::send_datagram(request.requestor, &ack) {
                tracing::debug!(requestor = request.requestor, error = %e, "failed to forward ack");
            }
            false
        });
    }

    pub fn pending_indirect_len(&self) -> usize {
        self.state.lock().indirect.len()
    }

    // --- Replies that read only the write-once identity ---

    /// Safe without the lock: only reads the node's own identity.
    pub fn reply_probe(&self, datagram_port: u16) {
        tracing::debug!(to = datagram_port, "acking probe");
        let ack = GossipMessage::ack(self.identity);
        if let Err(e) = transport::send_datagram(datagram_port, &ack) {
            tracing::debug!(to = datagram_port, error = %e, "failed to ack probe");
        }
    }

    /// Safe without the lock: only reads the node's own identity.
    pub fn reply_not_peer(&self, datagram_port: u16) {
        tracing::info!(to = datagram_port, "sending not-a-peer reply");
        let reply = GossipMessage::not_a_peer(self.identity);
        if let Err(e) = transport::send_datagram(datagram_port, &reply) {
            tracing::debug!(to = datagram_port, error = %e, "failed to send not-a-peer reply");
        }
    }

    // --- Rejoin ---

    /// First half of a rejoin: drop every rumor and probe in flight and
    /// re-arm the grace deadline. The re-armed deadline keeps the prober and
    /// gossiper quiet while the handshake runs without the lock. Terminal if
    /// no peers remain to rejoin through.
    pub fn reset_for_rejoin(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.peers.is_empty() {
            return Err(Error::NoRejoinGateway);
        }
        state.broadcasts.clear();
        state.probe = ProbeCycle::default();
        state.indirect.clear();
        state.lamport = 0;
        state.grace_until = Instant::now() + self.config.grace_period();
        Ok(())
    }

    /// A uniformly random current peer to handshake with.
    pub fn pick_rejoin_gateway(&self) -> Result<NodeId> {
        let state = self.state.lock();
        state
            .peers
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or(Error::NoRejoinGateway)
    }
}

// --- Unit Tests ---
