//! src/transport/join.rs
//!
//! The join handshake, from both sides, and the rejoin sequence built on
//! top of it. The stream endpoint exists only for this exchange: one
//! connection, one fixed-size request, one reply, close.

use crate::domain::{NodeId, PeerStatus};
use crate::error::{Error, Result};
use crate::state::Node;
use crate::transport::LOCALHOST;
use crate::wire::{JoinReply, JoinRequest};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Gateway side of the handshake: accepts one connection at a time and
/// admits the joiner into the cluster.
pub struct JoinListener {
    node: Arc<Node>,
    listener: TcpListener,
}

impl JoinListener {
    pub fn new(node: Arc<Node>, listener: TcpListener) -> Self {
        Self { node, listener }
    }

    pub async fn run(self, shutdown_token: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    tracing::info!("join listener received shutdown signal");
                    return Ok(());
                },
                accepted = self.listener.accept() => {
                    let stream = match accepted {
                        Ok((stream, _)) => stream,
                        Err(e) => {
                            tracing::debug!(error = %e, "failed to accept join connection, resuming");
                            continue;
                        }
                    };
                    match self.admit(stream).await {
                        Ok(()) => {}
                        // A full peer table is a broken deployment assumption,
                        // not a bad connection.
                        Err(e @ Error::PeerCapacity { .. }) => return Err(e),
                        Err(e) => tracing::debug!(error = %e, "join handshake failed, resuming"),
                    }
                }
            }
        }
    }

    async fn admit(&self, mut stream: TcpStream) -> Result<()> {
        let mut buf = [0u8; JoinRequest::WIRE_LEN];
        stream.read_exact(&mut buf).await?;
        let request = JoinRequest::decode(&buf)?;
        let Some(joiner) = request.node_id() else {
            tracing::debug!(?request, "ignoring join request with out-of-range ports");
            return Ok(());
        };
        tracing::debug!(joiner = %joiner, "received join request");

        // A rejoining node may still be in the table under its old entry;
        // the reply must not advertise the joiner back to itself.
        self.node.remove_peer(joiner);

        let reply = self.node.join_reply();
        stream.write_all(&reply.encode()?).await?;
        stream.shutdown().await?;

        self.node.append_member(joiner)?;
        self.node.append_broadcast(joiner, PeerStatus::Joined);
        tracing::info!(joiner = %joiner, "accepted join");
        Ok(())
    }
}

/// Client side of the handshake: announce ourselves to the gateway and
/// return the peer list it hands back (which includes the gateway).
pub async fn join_network(identity: NodeId, gateway: NodeId) -> Result<Vec<NodeId>> {
    let mut stream = TcpStream::connect((LOCALHOST, gateway.stream_port)).await?;
    stream.write_all(&JoinRequest::new(identity).encode()?).await?;

    // The gateway closes the stream after the reply; read until then.
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let reply = JoinReply::decode(&buf)?;

    let peers = reply.node_ids();
    tracing::info!(
        gateway = %gateway,
        peers = peers.len(),
        "received join reply, discovered network"
    );
    Ok(peers)
}

/// Re-enter the cluster after being told we are not a member. Clears local
/// protocol state, waits out a fresh grace period, and re-executes the join
/// handshake against a randomly chosen remembered peer. Failure at any step
/// is fatal: with no usable gateway this node cannot get back in.
pub async fn rejoin(node: &Arc<Node>) -> Result<()> {
    node.reset_for_rejoin()?;
    tracing::info!("cleared local state, rejoining after grace period");
    tokio::time::sleep(node.config().grace_period()).await;

    let gateway = node.pick_rejoin_gateway()?;
    tracing::info!(gateway = %gateway, "rejoining via gateway");
    let peers = join_network(node.identity(), gateway).await?;
    node.populate(peers);
    Ok(())
}
