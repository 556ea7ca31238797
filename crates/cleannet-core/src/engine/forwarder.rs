//! Upstream forwarding capabilities
//!
//! The engine is parameterized over a [`Forwarder`] rather than an ad-hoc
//! closure, and the forwarder over a [`SocketProtector`] so the host can
//! exempt upstream sockets from the tunnel's own routing.

use crate::error::{Error, Result};
use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::trace;

/// Receive buffer for a single upstream reply datagram
const MAX_UPSTREAM_REPLY: usize = 4096;

/// Capability to exempt an outbound socket from the tunnel's routing.
///
/// Without protection, upstream queries sent by the forward path would be
/// captured by the tunnel again and loop forever.
pub trait SocketProtector: Send + Sync {
    /// Mark `socket` as exempt from tunnel routing
    fn protect(&self, socket: &UdpSocket) -> io::Result<()>;
}

/// No-op protector for hosts whose routing already exempts this process
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProtection;

impl SocketProtector for NoProtection {
    fn protect(&self, _socket: &UdpSocket) -> io::Result<()> {
        Ok(())
    }
}

/// One upstream DNS round trip.
pub trait Forwarder: Send + Sync {
    /// Send `query` to the upstream resolver on `dst_port` and wait for a
    /// single reply datagram.
    fn forward(
        &self,
        query: &[u8],
        dst_port: u16,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Production forwarder: a fresh protected UDP socket per query, one send,
/// one receive, bounded by an explicit timeout.
pub struct UdpForwarder<P = NoProtection> {
    upstream: IpAddr,
    timeout: Duration,
    protector: P,
}

impl UdpForwarder<NoProtection> {
    /// Create a forwarder without socket protection
    pub fn new(upstream: IpAddr, timeout: Duration) -> Self {
        Self::with_protector(upstream, timeout, NoProtection)
    }
}

impl<P: SocketProtector> UdpForwarder<P> {
    /// Create a forwarder with the given socket protector
    pub fn with_protector(upstream: IpAddr, timeout: Duration, protector: P) -> Self {
        Self {
            upstream,
            timeout,
            protector,
        }
    }

    fn bind_addr(&self) -> SocketAddr {
        match self.upstream {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        }
    }
}

impl<P: SocketProtector> Forwarder for UdpForwarder<P> {
    fn forward(
        &self,
        query: &[u8],
        dst_port: u16,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send {
        async move {
            let socket = UdpSocket::bind(self.bind_addr())
                .await
                .map_err(|e| Error::upstream(format!("bind failed: {e}")))?;

            self.protector
                .protect(&socket)
                .map_err(|e| Error::upstream(format!("socket protection failed: {e}")))?;

            let upstream = SocketAddr::new(self.upstream, dst_port);
            socket
                .connect(upstream)
                .await
                .map_err(|e| Error::upstream(format!("connect to {upstream} failed: {e}")))?;
            socket
                .send(query)
                .await
                .map_err(|e| Error::upstream(format!("send to {upstream} failed: {e}")))?;

            let mut buf = vec![0u8; MAX_UPSTREAM_REPLY];
            let len = tokio::time::timeout(self.timeout, socket.recv(&mut buf))
                .await
                .map_err(|_| {
                    Error::upstream(format!(
                        "no reply from {upstream} within {:?}",
                        self.timeout
                    ))
                })?
                .map_err(|e| Error::upstream(format!("receive from {upstream} failed: {e}")))?;

            buf.truncate(len);
            trace!(%upstream, reply_len = len, "Upstream round trip complete");
            Ok(buf)
        }
    }
}
