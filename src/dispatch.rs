//! src/dispatch.rs
//!
//! The datagram receive loop. Every inbound message is first screened
//! against the peer table (strangers get a `NotAPeer` reply and nothing
//! else) and then routed to the membership table, the probe engine, or the
//! rejoin sequence.

use crate::error::{Error, Result};
use crate::state::Node;
use crate::transport::join;
use crate::wire::{GossipMessage, MessageKind, MAX_DATAGRAM_LEN};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

pub struct Dispatcher {
    node: Arc<Node>,
    socket: UdpSocket,
}

impl Dispatcher {
    pub fn new(node: Arc<Node>, socket: UdpSocket) -> Self {
        Self { node, socket }
    }

    pub async fn run(self, shutdown_token: CancellationToken) -> Result<()> {
        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    tracing::info!("dispatcher received shutdown signal");
                    return Ok(());
                },
                received = self.socket.recv_from(&mut buf) => {
                    let len = match received {
                        Ok((len, _)) => len,
                        Err(e) => {
                            tracing::debug!(error = %e, "datagram receive failed, resuming");
                            continue;
                        }
                    };
                    let message = match GossipMessage::decode(&buf[..len]) {
                        Ok(message) => message,
                        Err(e) => {
                            tracing::debug!(error = %e, "undecodable datagram, dropping");
                            continue;
                        }
                    };
                    // Routing errors are fatal by construction: the benign
                    // ones are absorbed further down.
                    self.route(message).await?;
                }
            }
        }
    }

    async fn route(&self, message: GossipMessage) -> Result<()> {
        let Some(sender) = message.sender_datagram_port() else {
            tracing::debug!("dropping message with out-of-range sender port");
            return Ok(());
        };

        // The stranger check: a sender we do not recognize is told so and
        // ignored. This is what lets a wrongly-evicted node find out.
        if !self.node.is_peer(sender) {
            tracing::debug!(sender, "message from unknown sender");
            self.node.reply_not_peer(sender);
            return Ok(());
        }

        match message.kind {
            MessageKind::GossipUpdate => {
                tracing::debug!(sender, changes = message.cnt_updates, "received gossip");
                self.node.process_updates(&message);
            }
            MessageKind::Probe => {
                self.node.reply_probe(sender);
            }
            MessageKind::AckProbe => {
                self.node.check_ack(sender);
                self.node.fulfil_request_probes(sender);
            }
            MessageKind::RequestProbe => {
                let Some(target) = message.target_datagram_port() else {
                    tracing::debug!(sender, "request-probe without a valid target, dropping");
                    return Ok(());
                };
                self.node.append_request_probe(target, sender)?;
            }
            MessageKind::NotAPeer => {
                tracing::info!(sender, "told we are not a peer, rejoining");
                // Runs inline: no datagrams are consumed mid-rejoin.
                self.rejoin().await?;
            }
        }
        Ok(())
    }

    async fn rejoin(&self) -> Result<()> {
        match join::rejoin(&self.node).await {
            Ok(()) => Ok(()),
            Err(e @ Error::NoRejoinGateway) => {
                tracing::error!("no peers left to rejoin through, giving up");
                Err(e)
            }
            Err(e) => {
                tracing::error!(error = %e, "rejoin handshake failed");
                Err(e)
            }
        }
    }
}
