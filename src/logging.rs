//! src/logging.rs
//!
//! Tracing subscriber setup for the `node` binary. Output is teed to stdout
//! and to an append-only per-node file named `<stream>_<datagram>.log`.
//!
//! Filtering is environment-driven (`RUST_LOG`), which subsumes the usual
//! build-time verbosity toggles: the default `info` level hides debug
//! chatter, and a stress run can silence everything except the periodic
//! peer-table snapshots with `RUST_LOG=off,peers=info` (the snapshots are
//! emitted under the dedicated `peers` target).

use crate::domain::NodeId;
use crate::error::Result;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. Call exactly once, early in
/// `main()`.
pub fn init(identity: NodeId) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(format!("{}_{}.log", identity.stream_port, identity.datagram_port))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout.and(Arc::new(log_file)))
        .init();

    Ok(())
}
