//! src/engine/mod.rs
//!
//! The failure-detection and dissemination services. The `Prober` walks the
//! peer table in randomized sweeps, escalating from direct to indirect
//! probes before passing a verdict; the `Gossiper` flushes the broadcast
//! queue to random peers once per round. Both stay quiet until the node's
//! grace deadline has passed, which also covers the quiescence window around
//! a rejoin.

use crate::state::Node;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;

pub mod protocol;

/// Drives the two-phase probe cycle at a fixed cadence.
pub struct Prober {
    node: Arc<Node>,
}

impl Prober {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    pub async fn run(self, shutdown_token: CancellationToken) {
        tracing::info!("probe engine started");
        let period = self.node.config().probe_period();
        // Direct phase gets a quarter of the cycle, the indirect fallback
        // the rest.
        let direct_phase = period / 4;
        let indirect_phase = period - direct_phase;

        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    tracing::info!("probe engine received shutdown signal");
                    break;
                },
                _ = self.cycle(direct_phase, indirect_phase) => {}
            }
        }
    }

    async fn cycle(&self, direct_phase: Duration, indirect_phase: Duration) {
        let grace = self.node.remaining_grace();
        if !grace.is_zero() {
            time::sleep(grace).await;
        }

        self.node.probe_next();
        time::sleep(direct_phase).await;

        // No ack within the direct phase: fan the probe out through peers.
        self.node.request_probes_if_no_ack();
        time::sleep(indirect_phase).await;

        self.node.check_probed();
    }
}

/// Flushes the broadcast queue once per gossip round.
pub struct Gossiper {
    node: Arc<Node>,
}

impl Gossiper {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    pub async fn run(self, shutdown_token: CancellationToken) {
        tracing::info!("gossiper started");
        let period = self.node.config().gossip_period();

        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    tracing::info!("gossiper received shutdown signal");
                    break;
                },
                _ = self.round(period) => {}
            }
        }
    }

    async fn round(&self, period: Duration) {
        let grace = self.node.remaining_grace();
        if !grace.is_zero() {
            time::sleep(grace).await;
        }

        self.node.gossip_tick();
        time::sleep(period).await;
    }
}
