//! src/app.rs
//!
//! Defines the main `App` struct, which owns the shared `Node` and manages
//! the lifecycle of the concurrent services: join listener, dispatcher,
//! prober, and gossiper, with the main task doubling as the periodic
//! status reporter.

use crate::cli::StartMode;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::domain::NodeId;
use crate::engine::{Gossiper, Prober};
use crate::error::Result;
use crate::state::Node;
use crate::transport::{self, join::JoinListener};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Encapsulates one membership node and the lifecycle of its services.
pub struct App {
    node: Arc<Node>,
    mode: StartMode,
    shutdown_token: CancellationToken,
}

impl App {
    pub fn new(identity: NodeId, mode: StartMode, config: Config) -> Result<Self> {
        Ok(Self {
            node: Arc::new(Node::new(identity, config)),
            mode,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Shared handle to the node, mainly so tests can observe its state.
    pub fn node(&self) -> Arc<Node> {
        self.node.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// The main run loop of the application:
    ///
    ///   1. Bind both endpoints (so the cluster can reach us immediately).
    ///   2. Populate the peer table from the seeds, or handshake with the
    ///      join gateway. An initial join failure is fatal.
    ///   3. Spawn the services and report the peer table periodically until
    ///      a shutdown signal or a fatal service error arrives.
    pub async fn run(self) -> Result<()> {
        let identity = self.node.identity();
        tracing::info!(node = %identity, "starting node");

        let stream_listener =
            transport::bind_stream_listener(identity.stream_port, self.node.config()).await?;
        let datagram_socket =
            transport::bind_datagram_socket(identity.datagram_port, self.node.config()).await?;

        match &self.mode {
            StartMode::Join(gateway) => {
                tracing::info!(gateway = %gateway, "joining cluster via gateway");
                let peers = transport::join::join_network(identity, *gateway).await?;
                self.node.populate(peers);
            }
            StartMode::Seeds(seeds) => {
                for (i, seed) in seeds.iter().enumerate() {
                    tracing::debug!(seed = %seed, "seed {} configured", i + 1);
                }
                self.node.populate(seeds.clone());
            }
        }

        // --- Instantiate and spawn the services ---
        let join_task = self.spawn_fatal(
            "join listener",
            JoinListener::new(self.node.clone(), stream_listener).run(self.shutdown_token.clone()),
        );
        let dispatcher_task = self.spawn_fatal(
            "dispatcher",
            Dispatcher::new(self.node.clone(), datagram_socket).run(self.shutdown_token.clone()),
        );
        let prober_task =
            tokio::spawn(Prober::new(self.node.clone()).run(self.shutdown_token.clone()));
        let gossiper_task =
            tokio::spawn(Gossiper::new(self.node.clone()).run(self.shutdown_token.clone()));

        // --- Wait for a shutdown signal, reporting peers in the meantime ---
        let ctrl_c_token = self.shutdown_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received interrupt, initiating shutdown");
                ctrl_c_token.cancel();
            }
        });

        let mut status_timer = tokio::time::interval(self.node.config().status_period());
        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = status_timer.tick() => {
                    tracing::info!(target: "peers", "{}", self.node.snapshot());
                }
            }
        }

        // --- Await service termination, surfacing the first fatal error ---
        let mut failure = None;
        for (name, handle) in [("join listener", join_task), ("dispatcher", dispatcher_task)] {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failure = failure.or(Some(e)),
                Err(e) => tracing::error!(service = name, error = %e, "service task panicked"),
            }
        }
        let _ = prober_task.await;
        let _ = gossiper_task.await;

        match failure {
            Some(e) => Err(e),
            None => {
                tracing::info!("node has shut down");
                Ok(())
            }
        }
    }

    /// Spawns a fallible service; an error cancels the whole node so that
    /// `run` can surface it.
    fn spawn_fatal(
        &self,
        name: &'static str,
        service: impl Future<Output = Result<()>> + Send + 'static,
    ) -> JoinHandle<Result<()>> {
        let token = self.shutdown_token.clone();
        tokio::spawn(async move {
            let result = service.await;
            if let Err(e) = &result {
                tracing::error!(service = name, error = %e, "service failed");
                token.cancel();
            }
            result
        })
    }
}
