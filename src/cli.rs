//! src/cli.rs
//!
//! Command-line argument surface of the `node` binary, defined with `clap`
//! derive. A node is started either in seed mode (every seed is handed the
//! full list of its siblings) or in join mode (one gateway to handshake
//! with).

use crate::domain::NodeId;
use crate::error::{Error, Result};
use clap::Parser;

/// SWIM-style gossip cluster membership node.
///
/// Start a network:  node --ports <STREAM> <DATAGRAM> --seed <STREAM> <DATAGRAM> [--seed ...]
/// Join a network:   node --ports <STREAM> <DATAGRAM> --join <STREAM> <DATAGRAM>
#[derive(Parser, Debug)]
#[command(name = "node", about = "SWIM-style gossip cluster membership node", version)]
pub struct Cli {
    /// This node's identity: its join stream port followed by its gossip
    /// datagram port.
    #[arg(long, num_args = 2, value_names = ["STREAM", "DATAGRAM"], required = true)]
    pub ports: Vec<u16>,

    /// Join an existing cluster through the given gateway node.
    #[arg(long, num_args = 2, value_names = ["STREAM", "DATAGRAM"], conflicts_with = "seed")]
    pub join: Option<Vec<u16>>,

    /// A seed peer of a new cluster. Repeat once per seed.
    #[arg(long, num_args = 2, value_names = ["STREAM", "DATAGRAM"], action = clap::ArgAction::Append)]
    pub seed: Vec<u16>,
}

/// How the node enters the cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartMode {
    /// Handshake with the given gateway and take over its peer list.
    Join(NodeId),
    /// Start with a fixed peer list of sibling seeds.
    Seeds(Vec<NodeId>),
}

impl Cli {
    pub fn identity(&self) -> NodeId {
        // clap enforces exactly two values for --ports.
        NodeId::new(self.ports[0], self.ports[1])
    }

    pub fn mode(&self) -> Result<StartMode> {
        if let Some(gateway) = &self.join {
            return Ok(StartMode::Join(NodeId::new(gateway[0], gateway[1])));
        }
        if self.seed.is_empty() {
            return Err(Error::Usage("one of --join or --seed is required"));
        }
        let seeds = self.seed.chunks(2).map(|pair| NodeId::new(pair[0], pair[1])).collect();
        Ok(StartMode::Seeds(seeds))
    }
}
