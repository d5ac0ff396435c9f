//! # Discovery coordinator
//!
//! Composes the sweep, the fingerprinter and hostname resolution into the
//! "find my future cluster nodes" use case: sweep the range, analyze every
//! responsive address concurrently, keep the confirmed/possible candidates
//! and rank them by confidence. Completion order across hosts is network
//! dependent; presentation order is imposed by the final sort, with the
//! original discovery order preserved inside each tier.

use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use bedrock_common::config::EngineConfig;
use bedrock_common::info;
use bedrock_common::network::host::CandidateHost;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::exec::{CommandRunner, LocalRunner, SshRunner};
use crate::net::fingerprint::{self, Fingerprint};
use crate::net::sweep;

/// Outcome of one discovery run.
#[derive(Debug, Serialize)]
pub struct DiscoveryReport {
    pub hosts: Vec<CandidateHost>,
    /// Number of addresses that answered the sweep, including ones later
    /// filtered out by confidence.
    pub total_scanned: usize,
    #[serde(serialize_with = "as_seconds")]
    pub scan_time: Duration,
}

fn as_seconds<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Runs the full discovery sequence against a CIDR range.
pub async fn discover(cidr: &str, cfg: &EngineConfig) -> anyhow::Result<DiscoveryReport> {
    let start: Instant = Instant::now();

    let active: Vec<Ipv4Addr> = sweep::ping_sweep(cidr, cfg).await?;
    let total_scanned: usize = active.len();
    info!("sweep found {total_scanned} responsive addresses");

    // Analyze all responsive hosts concurrently, keyed by sweep index so
    // the ranking below sees them in discovery order.
    let mut analyses: JoinSet<(usize, CandidateHost)> = JoinSet::new();
    for (index, address) in active.into_iter().enumerate() {
        let cfg = cfg.clone();
        analyses.spawn(async move {
            let host = analyze_host(IpAddr::V4(address), &cfg).await;
            (index, host)
        });
    }

    let mut indexed: Vec<(usize, CandidateHost)> = Vec::with_capacity(total_scanned);
    while let Some(result) = analyses.join_next().await {
        if let Ok(entry) = result {
            indexed.push(entry);
        }
    }
    indexed.sort_by_key(|(index, _)| *index);

    let hosts = rank_hosts(indexed.into_iter().map(|(_, host)| host).collect());
    info!("discovery kept {} candidates", hosts.len());

    Ok(DiscoveryReport {
        hosts,
        total_scanned,
        scan_time: start.elapsed(),
    })
}

/// Filters to the candidate tiers and stable-sorts by confidence, so
/// confirmed hosts lead and discovery order survives within a tier.
pub fn rank_hosts(hosts: Vec<CandidateHost>) -> Vec<CandidateHost> {
    let mut kept: Vec<CandidateHost> = hosts
        .into_iter()
        .filter(|host| host.confidence.is_candidate())
        .collect();
    kept.sort_by_key(|host| host.confidence);
    kept
}

async fn analyze_host(address: IpAddr, cfg: &EngineConfig) -> CandidateHost {
    let print: Fingerprint =
        fingerprint::fingerprint(address, cfg.ssh_port, cfg.banner_timeout).await;

    let hostname: Option<String> = if print.ssh_available {
        resolve_hostname(address, cfg).await
    } else {
        None
    };

    CandidateHost {
        ip: address,
        hostname,
        banner: print.banner,
        ssh_available: print.ssh_available,
        confidence: print.confidence,
        os_guess: print.os_guess,
    }
}

/// Tries the SSH session first (the only reliable method on a clean
/// system), then the non-SSH fallbacks: mDNS, NetBIOS, reverse DNS.
async fn resolve_hostname(address: IpAddr, cfg: &EngineConfig) -> Option<String> {
    let ssh = SshRunner::new(&cfg.ssh_user, address, cfg.command_timeout);
    if let Ok(output) = ssh.run("hostname").await {
        let name = output.trim();
        if !name.is_empty() && name != address.to_string() {
            return Some(name.to_string());
        }
    }

    let local = LocalRunner::new(cfg.command_timeout);

    if let Ok(output) = local.run(&format!("avahi-resolve -a {address}")).await {
        if let Some(name) = parse_avahi(&output) {
            return Some(name);
        }
    }

    if let Ok(output) = local.run(&format!("nmblookup -A {address}")).await {
        if let Some(name) = parse_nmblookup(&output) {
            return Some(name);
        }
    }

    if let Ok(output) = local.run(&format!("dig +short -x {address}")).await {
        if let Some(name) = parse_reverse_dns(&output, &address.to_string()) {
            return Some(name);
        }
    }

    None
}

/// `avahi-resolve -a` output: `192.168.1.101\thostname.local`.
pub fn parse_avahi(output: &str) -> Option<String> {
    let mut parts = output.split_whitespace();
    let _address = parts.next()?;
    let name = parts.next()?;
    let name = name.strip_suffix(".local").unwrap_or(name);
    (!name.is_empty()).then(|| name.to_string())
}

/// `nmblookup -A` output: the `<00>` entry that is not a GROUP record
/// carries the machine name.
pub fn parse_nmblookup(output: &str) -> Option<String> {
    for line in output.lines() {
        if line.contains("<00>") && !line.contains("GROUP") {
            if let Some(name) = line.split_whitespace().next() {
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }
    None
}

/// `dig +short -x` output: accept only a real FQDN and return its first
/// label.
pub fn parse_reverse_dns(output: &str, address: &str) -> Option<String> {
    let name = output.trim().trim_end_matches('.');
    if name.is_empty() || name.starts_with(';') || name == address || !name.contains('.') {
        return None;
    }
    name.split('.').next().map(|label| label.to_string())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use bedrock_common::network::host::Confidence;

    fn host(last_octet: u8, confidence: Confidence) -> CandidateHost {
        CandidateHost {
            ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet)),
            hostname: None,
            banner: None,
            ssh_available: confidence != Confidence::Unknown,
            confidence,
            os_guess: None,
        }
    }

    #[test]
    fn ranking_filters_and_orders_by_confidence() {
        let hosts = vec![
            host(1, Confidence::Possible),
            host(2, Confidence::Unknown),
            host(3, Confidence::Confirmed),
            host(4, Confidence::Unlikely),
            host(5, Confidence::Possible),
            host(6, Confidence::Confirmed),
        ];

        let ranked = rank_hosts(hosts);
        let octets: Vec<u8> = ranked
            .iter()
            .map(|h| match h.ip {
                IpAddr::V4(v4) => v4.octets()[3],
                IpAddr::V6(_) => unreachable!(),
            })
            .collect();

        // Confirmed first, then possible; discovery order kept per tier.
        assert_eq!(octets, vec![3, 6, 1, 5]);
    }

    #[test]
    fn ranking_of_nothing_is_empty() {
        assert!(rank_hosts(Vec::new()).is_empty());
        assert!(rank_hosts(vec![host(9, Confidence::Unknown)]).is_empty());
    }

    #[test]
    fn avahi_output_is_parsed() {
        assert_eq!(
            parse_avahi("192.168.1.101\tvega.local\n"),
            Some("vega".to_string())
        );
        assert_eq!(parse_avahi("192.168.1.101 altair\n"), Some("altair".to_string()));
        assert_eq!(parse_avahi(""), None);
        assert_eq!(parse_avahi("192.168.1.101"), None);
    }

    #[test]
    fn nmblookup_output_is_parsed() {
        let output = "Looking up status of 192.168.1.50\n\
                      \tVEGA            <00> -         B <ACTIVE>\n\
                      \tWORKGROUP       <00> - <GROUP> B <ACTIVE>\n";
        assert_eq!(parse_nmblookup(output), Some("VEGA".to_string()));
        assert_eq!(parse_nmblookup("no name registered"), None);
    }

    #[test]
    fn reverse_dns_output_is_parsed() {
        assert_eq!(
            parse_reverse_dns("vega.home.arpa.\n", "192.168.1.50"),
            Some("vega".to_string())
        );
        // Bare names, errors and echoes of the address are rejected.
        assert_eq!(parse_reverse_dns("vega", "192.168.1.50"), None);
        assert_eq!(parse_reverse_dns(";; connection timed out", "192.168.1.50"), None);
        assert_eq!(parse_reverse_dns("192.168.1.50", "192.168.1.50"), None);
        assert_eq!(parse_reverse_dns("", "192.168.1.50"), None);
    }
}
