//! src/transport/mod.rs
//!
//! Socket plumbing for the two per-node endpoints: the join stream listener
//! and the gossip datagram socket, both bound on loopback with a bounded
//! retry loop, plus the outbound datagram primitive.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::wire::GossipMessage;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::{TcpListener, UdpSocket};

pub mod join;

pub(crate) const LOCALHOST: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Bind the join stream endpoint, retrying on failure. Exhausting the
/// retries is fatal.
pub async fn bind_stream_listener(port: u16, config: &Config) -> Result<TcpListener> {
    let mut attempts = 0;
    loop {
        match try_bind_stream(port) {
            Ok(listener) => {
                tracing::info!(port, "listening on join stream port");
                return Ok(listener);
            }
            Err(e) if attempts < config.bind_retries => {
                attempts += 1;
                tracing::warn!(port, error = %e, "failed to bind join stream port, retrying");
                tokio::time::sleep(config.bind_retry_delay()).await;
            }
            Err(source) => {
                return Err(Error::Bind { kind: "stream", port, attempts: attempts + 1, source })
            }
        }
    }
}

/// Bind the gossip datagram endpoint, retrying on failure. Exhausting the
/// retries is fatal.
pub async fn bind_datagram_socket(port: u16, config: &Config) -> Result<UdpSocket> {
    let mut attempts = 0;
    loop {
        match try_bind_datagram(port) {
            Ok(socket) => {
                tracing::info!(port, "listening on gossip datagram port");
                return Ok(socket);
            }
            Err(e) if attempts < config.bind_retries => {
                attempts += 1;
                tracing::warn!(port, error = %e, "failed to bind gossip datagram port, retrying");
                tokio::time::sleep(config.bind_retry_delay()).await;
            }
            Err(source) => {
                return Err(Error::Bind { kind: "datagram", port, attempts: attempts + 1, source })
            }
        }
    }
}

fn try_bind_stream(port: u16) -> io::Result<TcpListener> {
    let addr = SocketAddr::from((LOCALHOST, port));
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(50)?;
    let std_listener: std::net::TcpListener = socket.into();
    std_listener.set_nonblocking(true)?;
    TcpListener::from_std(std_listener)
}

fn try_bind_datagram(port: u16) -> io::Result<UdpSocket> {
    let addr = SocketAddr::from((LOCALHOST, port));
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    let std_socket: std::net::UdpSocket = socket.into();
    std_socket.set_nonblocking(true)?;
    UdpSocket::from_std(std_socket)
}

/// Send one message to a peer's datagram port. Each call opens, uses, and
/// drops its own socket; the send never blocks and failures are the
/// caller's to log and absorb.
pub fn send_datagram(datagram_port: u16, message: &GossipMessage) -> Result<()> {
    let bytes = message.encode()?;
    let socket = std::net::UdpSocket::bind((LOCALHOST, 0))?;
    socket.send_to(&bytes, (LOCALHOST, datagram_port))?;
    Ok(())
}
