//! Timeout-bounded TCP probes for host reachability and open ports.
//!
//! Probe failures are expected and frequent — a closed port or a silent host
//! is a result, not an error — so both traits answer with a plain `bool` and
//! contain every I/O error internally.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;

/// Ports tried by the reachability connect ping. A response on any of them,
/// including an RST, proves the host is up.
const PING_PORTS: [u16; 4] = [80, 443, 22, 7];

/// Answers whether a host responds within a bounded time.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// True if `addr` gave any sign of life within `timeout`.
    async fn is_reachable(&self, addr: Ipv4Addr, timeout: Duration) -> bool;
}

/// Answers whether a TCP port accepts a connection within a bounded time.
#[async_trait]
pub trait PortProbe: Send + Sync {
    /// True if `(addr, port)` completed a TCP handshake within `timeout`.
    async fn is_open(&self, addr: Ipv4Addr, port: u16, timeout: Duration) -> bool;
}

/// Production probe. Uses plain connect attempts, no raw sockets, so it runs
/// unprivileged everywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProbe;

impl TcpProbe {
    /// Creates the probe.
    #[must_use]
    pub fn new() -> Self {
        TcpProbe
    }

    /// Connect ping against one socket. An established connection or a fast
    /// refusal both count: either way something answered at that address.
    async fn tcp_ping(self, socket: SocketAddr, timeout: Duration) -> bool {
        match time::timeout(timeout, TcpStream::connect(socket)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset
            ),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn is_reachable(&self, addr: Ipv4Addr, timeout: Duration) -> bool {
        let [a, b, c, d] =
            PING_PORTS.map(|port| self.tcp_ping(SocketAddr::from((addr, port)), timeout));
        let (a, b, c, d) = tokio::join!(a, b, c, d);
        let reachable = a || b || c || d;

        if reachable {
            debug!("host {addr} answered the connect ping");
        }
        reachable
    }
}

#[async_trait]
impl PortProbe for TcpProbe {
    async fn is_open(&self, addr: Ipv4Addr, port: u16, timeout: Duration) -> bool {
        let socket = SocketAddr::from((addr, port));
        match time::timeout(timeout, TcpStream::connect(socket)).await {
            Ok(Ok(mut stream)) => {
                debug!("connection was successful, shutting down stream {socket}");
                if let Err(e) = stream.shutdown().await {
                    debug!("shutdown stream error {e}");
                }
                true
            }
            Ok(Err(_)) | Err(_) => false,
        }
    }
}
