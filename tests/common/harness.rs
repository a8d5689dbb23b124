//! tests/common/harness.rs
//!
//! A test harness for creating and managing in-process clusters. It
//! abstracts away the boilerplate of:
//! - Allocating ephemeral, collision-free port pairs for node identities.
//! - Spawning nodes in the background with compressed protocol periods.
//! - Observing a node's membership state through its shared handle.
//! - Managing graceful shutdown.

use anyhow::Result;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use swim_membership::{App, Config, Node, NodeId, StartMode};
use tokio_util::sync::CancellationToken;

/// Protocol tunables compressed so that grace, gossip, and probe phases all
/// play out within a few hundred milliseconds.
pub fn test_config() -> Config {
    Config {
        probe_period_ms: 500,
        gossip_period_ms: 150,
        grace_period_ms: 300,
        status_period_ms: 60_000,
        ..Config::default()
    }
}

/// Allocates `n` node identities on ports that are currently free. The
/// probe listeners are all held until every port is collected, so the same
/// port is never handed out twice within one call.
pub fn allocate_ids(n: usize) -> Result<Vec<NodeId>> {
    let mut listeners = Vec::new();
    let mut ports = Vec::new();
    for _ in 0..2 * n {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        ports.push(listener.local_addr()?.port());
        listeners.push(listener);
    }
    Ok(ports.chunks(2).map(|pair| NodeId::new(pair[0], pair[1])).collect())
}

/// A handle to a running membership node in a test environment.
pub struct TestNode {
    pub id: NodeId,
    pub node: Arc<Node>,
    shutdown_token: CancellationToken,
}

impl TestNode {
    /// Configures and spawns a new node in a background task.
    pub async fn spawn(id: NodeId, mode: StartMode) -> Result<Self> {
        let app = App::new(id, mode, test_config())?;
        let node = app.node();
        let shutdown_token = app.shutdown_token();

        tokio::spawn(async move {
            if let Err(e) = app.run().await {
                tracing::error!(error = %e, "test node failed");
            }
        });

        // Give the endpoints a moment to bind (and join mode its handshake).
        tokio::time::sleep(Duration::from_millis(100)).await;
        tracing::info!(node = %id, "spawned test node");
        Ok(Self { id, node, shutdown_token })
    }

    pub fn peers(&self) -> Vec<NodeId> {
        self.node.peers()
    }

    /// Whether this node's peer set is exactly `expected`, order ignored.
    pub fn knows_exactly(&self, expected: &[NodeId]) -> bool {
        let mut peers = self.peers();
        peers.sort_by_key(|p| (p.stream_port, p.datagram_port));
        let mut expected = expected.to_vec();
        expected.sort_by_key(|p| (p.stream_port, p.datagram_port));
        peers == expected
    }

    /// Shuts down the node gracefully.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }
}

/// Polls `predicate` until it holds or `timeout` elapses.
pub async fn wait_until<F>(predicate: F, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    predicate()
}
