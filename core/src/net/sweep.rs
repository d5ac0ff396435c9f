//! # Reachability sweep
//!
//! Probes every usable address of a CIDR range with a single ICMP echo,
//! concurrently but in bounded batches so a large range cannot exhaust
//! ephemeral resources or trip abuse protections on the target network.
//! Silence is the expected common case: an address that does not answer is
//! simply absent from the result, never an error.

use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;

use bedrock_common::config::EngineConfig;
use bedrock_common::network::range;
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::debug;

/// Sweeps `cidr` and returns the addresses that answered, in ascending
/// order. An empty result is a valid outcome.
pub async fn ping_sweep(cidr: &str, cfg: &EngineConfig) -> anyhow::Result<Vec<Ipv4Addr>> {
    let hosts: Vec<Ipv4Addr> = range::cidr_hosts(cidr)?;
    let mut responsive: Vec<Ipv4Addr> = Vec::new();

    for batch in hosts.chunks(cfg.ping_batch_size.max(1)) {
        let mut probes: JoinSet<Option<Ipv4Addr>> = JoinSet::new();
        for &address in batch {
            let probe_timeout = cfg.ping_timeout;
            probes.spawn(async move { ping_probe(address, probe_timeout).await });
        }

        while let Some(result) = probes.join_next().await {
            if let Ok(Some(address)) = result {
                responsive.push(address);
            }
        }
    }

    responsive.sort_unstable();
    debug!("sweep of {cidr}: {} responsive", responsive.len());
    Ok(responsive)
}

/// One echo, one attempt. Any failure (spawn error, non-zero exit,
/// deadline) means "unreachable".
async fn ping_probe(address: Ipv4Addr, probe_timeout: Duration) -> Option<Ipv4Addr> {
    let wait_secs: u64 = probe_timeout.as_secs().max(1);

    let child = Command::new("ping")
        .arg("-c")
        .arg("1")
        .arg("-W")
        .arg(wait_secs.to_string())
        .arg(address.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    // The outer deadline guards against a ping binary that ignores -W.
    let status = tokio::time::timeout(probe_timeout + Duration::from_secs(1), child)
        .await
        .ok()?
        .ok()?;

    status.success().then_some(address)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
