//! # CIDR range expansion
//!
//! Turns a CIDR string into the list of individual host addresses the
//! sweeper will probe. Network and broadcast addresses are excluded for
//! prefixes shorter than /31; the expansion is capped so a careless `/8`
//! cannot turn one scan request into sixteen million probes.

use std::net::Ipv4Addr;

use pnet::ipnetwork::Ipv4Network;

/// Hard upper bound on the number of addresses one sweep may probe.
pub const MAX_SWEEP_HOSTS: usize = 254;

/// Expands a CIDR string into its usable host addresses, capped at
/// [`MAX_SWEEP_HOSTS`].
///
/// For `/31` and `/32` there is no network/broadcast pair to strip, so
/// every address in the block is usable.
pub fn cidr_hosts(cidr: &str) -> anyhow::Result<Vec<Ipv4Addr>> {
    let network: Ipv4Network = cidr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid network range '{cidr}': {e}"))?;

    let start: u32 = network.network().into();
    let end: u32 = network.broadcast().into();

    let (first, last) = if network.prefix() >= 31 {
        (start, end)
    } else {
        (start + 1, end - 1)
    };

    let hosts: Vec<Ipv4Addr> = (first..=last)
        .take(MAX_SWEEP_HOSTS)
        .map(Ipv4Addr::from)
        .collect();

    Ok(hosts)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
