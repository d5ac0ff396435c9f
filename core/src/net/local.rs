//! # Local-address resolution
//!
//! Decides whether an address belongs to the machine running the engine.
//! Two independent enumeration methods are unioned (interface listing and
//! the default-route source address), and a bind test acts as the
//! authoritative fallback: the kernel refuses to bind a listener to an
//! address it does not own, so a successful bind is proof of ownership.
//! Enumeration alone can miss addresses behind NAT helpers or virtual
//! interfaces, which is why the fallback exists.

use std::collections::HashSet;
use std::net::{IpAddr, TcpListener};
use std::process::Stdio;

use pnet::datalink;
use tokio::process::Command;
use tracing::debug;

/// Returns every IP address bound to a local interface, unioned with the
/// source address the kernel would use for outbound traffic. Loopback is
/// excluded; it is never a discovery target.
pub async fn local_addresses() -> HashSet<IpAddr> {
    let mut addresses: HashSet<IpAddr> = interface_addresses();

    if let Some(source) = route_source_address().await {
        addresses.insert(source);
    }

    addresses
}

/// True if `address` is owned by this machine.
pub async fn is_local_address(address: IpAddr) -> bool {
    if local_addresses().await.contains(&address) {
        return true;
    }
    bind_probe(address)
}

/// Attempts to bind a throwaway listener to `address`. The listener is
/// dropped immediately on every path, so no descriptor outlives the check.
pub fn bind_probe(address: IpAddr) -> bool {
    match TcpListener::bind((address, 0)) {
        Ok(_listener) => true,
        Err(e) => {
            debug!("bind probe for {address} failed: {e}");
            false
        }
    }
}

fn interface_addresses() -> HashSet<IpAddr> {
    datalink::interfaces()
        .into_iter()
        .filter(|interface| interface.is_up() && !interface.is_loopback())
        .flat_map(|interface| interface.ips.into_iter().map(|net| net.ip()))
        .filter(|ip| !ip.is_loopback())
        .collect()
}

async fn route_source_address() -> Option<IpAddr> {
    let output = Command::new("ip")
        .args(["route", "get", "8.8.8.8"])
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_route_source(&String::from_utf8_lossy(&output.stdout))
}

/// Extracts the source address from `ip route get` output, e.g.
/// `8.8.8.8 via 192.168.1.1 dev eth0 src 192.168.1.42 uid 1000`.
pub fn parse_route_source(output: &str) -> Option<IpAddr> {
    let mut tokens = output.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "src" {
            return tokens.next().and_then(|addr| addr.parse().ok());
        }
    }
    None
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
