//! src/lib.rs
//!
//! Main library crate for the SWIM-style cluster membership node.
//! This file declares the module hierarchy and exports the primary public
//! interface for the library, allowing it to be used by the binaries and for
//! integration testing.

// Declare the module hierarchy.
pub mod app;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod engine;
pub mod error;
pub mod logging;
pub mod state;
pub mod transport;
pub mod wire;

// Re-export key types for the public API.
pub use app::App;
pub use cli::{Cli, StartMode};
pub use config::Config;
pub use domain::NodeId;
pub use error::Error;
pub use state::Node;
