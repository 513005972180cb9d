use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use serde::Deserialize;
use shared::protocol::{BROADCAST_HOST, DEFAULT_PORT, MULTICAST_HOST, MULTICAST_TTL};

/// Network settings for one instance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiontConfig {
    /// Send to the limited broadcast address instead of the multicast group
    #[serde(default)]
    pub broadcast: bool,

    #[serde(default = "default_multicast_host")]
    pub multicast_host: Ipv4Addr,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

fn default_multicast_host() -> Ipv4Addr {
    MULTICAST_HOST
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_ttl() -> u32 {
    MULTICAST_TTL
}

impl Default for DiontConfig {
    fn default() -> Self {
        Self {
            broadcast: false,
            multicast_host: default_multicast_host(),
            port: default_port(),
            ttl: default_ttl(),
        }
    }
}

impl DiontConfig {
    pub fn broadcast() -> Self {
        Self {
            broadcast: true,
            ..Self::default()
        }
    }

    /// Where every outgoing message is sent
    pub fn destination(&self) -> SocketAddr {
        let host = if self.broadcast {
            BROADCAST_HOST
        } else {
            self.multicast_host
        };
        SocketAddr::new(IpAddr::V4(host), self.port)
    }
}
