use std::net::{IpAddr, SocketAddr};
use shared::types::Interface;

/// The address chosen as a device's primary IP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryIp {
    pub address: IpAddr,
    /// Whether one of the device's interfaces carries the address
    pub on_interface: bool,
}

/// Split a reported management address into host and optional port.
/// Accepts `host`, `host:port`, `[v6]:port`, bare v6 literals and a trailing
/// `/prefixlen`.
fn split_host_port(address: &str) -> Option<(&str, Option<u16>)> {
    let address = address.trim();
    let address = address.split('/').next().unwrap_or(address);
    if address.is_empty() {
        return None;
    }

    if address.parse::<IpAddr>().is_ok() {
        return Some((address, None));
    }
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
        return Some((host, port));
    }
    match address.rsplit_once(':') {
        Some((host, port)) => Some((host, port.parse().ok())),
        None => Some((address, None)),
    }
}

/// Resolve a device address by direct parse, falling back to DNS.
/// Returns every candidate in resolver order.
pub async fn resolve_address(address: &str) -> Vec<IpAddr> {
    if let Ok(sock) = address.trim().parse::<SocketAddr>() {
        return vec![sock.ip()];
    }
    let Some((host, port)) = split_host_port(address) else {
        return Vec::new();
    };
    if let Ok(ip) = host.parse::<IpAddr>() {
        return vec![ip];
    }

    match tokio::net::lookup_host((host, port.unwrap_or(0))).await {
        Ok(addrs) => {
            let mut resolved: Vec<IpAddr> = Vec::new();
            for a in addrs {
                if !resolved.contains(&a.ip()) {
                    resolved.push(a.ip());
                }
            }
            resolved
        }
        Err(e) => {
            tracing::debug!(host, error = %e, "Could not resolve device address");
            Vec::new()
        }
    }
}

/// Prefer a candidate that appears on one of the interfaces, otherwise keep
/// the first resolved one.
pub fn pick_primary(candidates: &[IpAddr], interfaces: &[Interface]) -> Option<PrimaryIp> {
    let on_interface = candidates.iter().find(|candidate| {
        interfaces
            .iter()
            .flat_map(|i| i.ip_addresses.iter())
            .any(|ip| ip.host().as_ref() == Some(*candidate))
    });

    match on_interface {
        Some(address) => Some(PrimaryIp { address: *address, on_interface: true }),
        None => candidates.first().map(|address| PrimaryIp { address: *address, on_interface: false }),
    }
}
