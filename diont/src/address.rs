//! Host address used to fill in records announced without a host.

use std::net::{IpAddr, Ipv4Addr};

pub trait AddressProvider: Send + Sync {
    fn current_host_address(&self) -> Option<String>;
}

/// Picks an address from the machine's network interfaces.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterfaceAddressProvider;

impl AddressProvider for InterfaceAddressProvider {
    fn current_host_address(&self) -> Option<String> {
        let interfaces = match if_addrs::get_if_addrs() {
            Ok(interfaces) => interfaces,
            Err(e) => {
                tracing::warn!("Failed to enumerate network interfaces: {}", e);
                return None;
            }
        };

        let candidates = interfaces.iter().filter_map(|iface| match iface.ip() {
            IpAddr::V4(v4) if !iface.is_loopback() => Some(v4),
            _ => None,
        });

        select_host_address(candidates).map(|addr| addr.to_string())
    }
}

/// Always answers with the same address, or with none.
#[derive(Debug, Default, Clone)]
pub struct StaticAddressProvider(pub Option<String>);

impl StaticAddressProvider {
    pub fn new(address: impl Into<String>) -> Self {
        Self(Some(address.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl AddressProvider for StaticAddressProvider {
    fn current_host_address(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Prefer a `192.168.*` address, else the first non-loopback IPv4 one.
pub fn select_host_address(addresses: impl IntoIterator<Item = Ipv4Addr>) -> Option<Ipv4Addr> {
    let mut first = None;
    for addr in addresses {
        if addr.is_loopback() {
            continue;
        }
        let [a, b, ..] = addr.octets();
        if a == 192 && b == 168 {
            return Some(addr);
        }
        first.get_or_insert(addr);
    }
    first
}
