//! src/main.rs
//!
//! Binary entry point. Responsible for parsing the command line,
//! initializing tracing, instantiating the `App`, and running it.

use anyhow::Context;
use clap::Parser;
use swim_membership::{logging, App, Cli, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let identity = cli.identity();
    let mode = cli.mode()?;

    // Tee logs to stdout and to this node's log file.
    logging::init(identity).context("Failed to initialize logging")?;

    let config = Config::load().context("Failed to load configuration")?;

    if let Err(e) = App::new(identity, mode, config)?.run().await {
        tracing::error!(error = %e, "node failed");
        std::process::exit(1);
    }

    Ok(())
}
