//! Datagram transport abstraction.
//!
//! The engine only needs "send bytes to an address" and "receive bytes with
//! the sender". `UdpTransport` does that over a real multicast/broadcast
//! socket; `MemoryNetwork` simulates one link-local segment in-process.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::config::DiontConfig;
use crate::error::Result;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Fire-and-forget send of one datagram.
    async fn send_to(&self, payload: &[u8], destination: SocketAddr) -> io::Result<()>;

    /// Wait for the next datagram. Must be cancel safe.
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

/// UDP socket bound to the discovery port, member of the multicast group.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind `0.0.0.0:port` with address reuse so several processes on one
    /// host can share the port, then join the group and apply TTL/broadcast.
    pub fn bind(config: &DiontConfig) -> Result<Self> {
        let local_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port);

        let socket = socket2::Socket::new(
            socket2::Domain::IPV4,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&local_addr.into())?;

        let socket = UdpSocket::from_std(socket.into())?;

        socket.set_multicast_loop_v4(true)?;
        socket.set_multicast_ttl_v4(config.ttl)?;
        socket.join_multicast_v4(config.multicast_host, Ipv4Addr::UNSPECIFIED)?;
        if config.broadcast {
            socket.set_broadcast(true)?;
        }

        tracing::info!(
            "Bound {} (group {}, ttl {}, broadcast {})",
            local_addr,
            config.multicast_host,
            config.ttl,
            config.broadcast
        );

        Ok(Self { socket })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, payload: &[u8], destination: SocketAddr) -> io::Result<()> {
        self.socket.send_to(payload, destination).await?;
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}

type Datagram = (Vec<u8>, SocketAddr);

/// In-process stand-in for one network segment. Every datagram sent by an
/// attached transport is delivered to all attached transports, the sender
/// included, like multicast with loopback enabled.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    members: Arc<Mutex<Vec<mpsc::UnboundedSender<Datagram>>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new endpoint with the given source address.
    pub fn attach(&self, address: SocketAddr) -> MemoryTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut members) = self.members.lock() {
            members.push(tx);
        }
        MemoryTransport {
            address,
            network: self.clone(),
            inbox: tokio::sync::Mutex::new(rx),
        }
    }

    /// Inject a datagram from outside any attached endpoint.
    pub fn inject(&self, payload: &[u8], from: SocketAddr) {
        if let Ok(mut members) = self.members.lock() {
            members.retain(|member| member.send((payload.to_vec(), from)).is_ok());
        }
    }
}

#[derive(Debug)]
pub struct MemoryTransport {
    address: SocketAddr,
    network: MemoryNetwork,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_to(&self, payload: &[u8], _destination: SocketAddr) -> io::Result<()> {
        self.network.inject(payload, self.address);
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let mut inbox = self.inbox.lock().await;
        let (payload, from) = inbox
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "memory network closed"))?;
        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        Ok((len, from))
    }
}
