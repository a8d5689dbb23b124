//! src/bin/launcher.rs
//!
//! Local-demo launcher: spawns one `node` child per `--seed` pair, handing
//! each child its own ports plus a `--seed` flag for every sibling, so that
//! every seed knows every other from the start. Ctrl-C tears the whole
//! cluster down.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::{Child, Command};
use std::time::Duration;

/// Spawn a local cluster of seed nodes.
///
/// Usage: launcher --seed <STREAM> <DATAGRAM> [--seed <STREAM> <DATAGRAM> ...]
#[derive(Parser, Debug)]
#[command(name = "launcher", about = "Spawn a local cluster of seed nodes", version)]
struct LauncherCli {
    /// A seed node's ports. Repeat once per seed.
    #[arg(long, num_args = 2, value_names = ["STREAM", "DATAGRAM"], required = true,
          action = clap::ArgAction::Append)]
    seed: Vec<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = LauncherCli::parse();
    let seeds: Vec<(u16, u16)> = cli.seed.chunks(2).map(|pair| (pair[0], pair[1])).collect();
    tracing::info!(seeds = seeds.len(), "setting up cluster");

    // The node binary sits next to this one.
    let node_binary = std::env::current_exe()
        .context("Failed to locate own executable")?
        .with_file_name("node");

    let mut children: Vec<Child> = Vec::new();
    for (i, &(stream_port, datagram_port)) in seeds.iter().enumerate() {
        let mut command = Command::new(&node_binary);
        command.arg("--ports").args([stream_port.to_string(), datagram_port.to_string()]);
        for (j, &(other_stream, other_datagram)) in seeds.iter().enumerate() {
            if j != i {
                command
                    .arg("--seed")
                    .args([other_stream.to_string(), other_datagram.to_string()]);
            }
        }

        let child = command
            .spawn()
            .with_context(|| format!("Failed to spawn seed {stream_port}-{datagram_port}"))?;
        tracing::info!(seed = %format!("{stream_port}-{datagram_port}"), pid = child.id(), "spawned seed");
        children.push(child);
    }

    let mut alive_timer = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received interrupt, stopping children");
                break;
            },
            _ = alive_timer.tick() => {
                tracing::info!(seeds = children.len(), "cluster running");
            }
        }
    }

    for child in &mut children {
        if let Err(e) = child.kill() {
            tracing::warn!(pid = child.id(), error = %e, "failed to kill child");
        }
        let _ = child.wait();
    }

    Ok(())
}
