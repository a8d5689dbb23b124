//! src/error.rs
//!
//! Defines the library's custom `Error` enum using `thiserror`.

use crate::domain::NodeId;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Invalid arguments: {0}")]
    Usage(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize or deserialize: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Failed to bind {kind} port {port} after {attempts} attempts: {source}")]
    Bind {
        kind: &'static str,
        port: u16,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Peer table full ({capacity} peers), cannot append {peer}")]
    PeerCapacity { peer: NodeId, capacity: usize },

    #[error("Pending indirect-request queue full ({capacity} entries)")]
    IndirectCapacity { capacity: usize },

    #[error("No known peers to rejoin through")]
    NoRejoinGateway,

    #[error("Tokio task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
