#![cfg(test)]
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use bedrock_common::config::EngineConfig;
use bedrock_common::network::host::Confidence;
use bedrock_core::discovery;
use bedrock_core::net::fingerprint;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

/// Fingerprints a real listener end to end: connect, banner read,
/// classification. No external binaries involved, so this always runs.
#[tokio::test]
async fn fingerprint_identifies_a_live_ubuntu_banner() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port: u16 = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let _ = stream
                .write_all(b"SSH-2.0-OpenSSH_9.6p1 Ubuntu-3ubuntu13.5\r\n")
                .await;
        }
    });

    let result = fingerprint::fingerprint(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        port,
        Duration::from_secs(2),
    )
    .await;

    assert!(result.ssh_available);
    assert_eq!(result.confidence, Confidence::Confirmed);
    assert_eq!(result.os_guess.as_deref(), Some("Ubuntu 24.04 LTS"));
}

/// Needs a working `ping` binary, so it only runs on demand.
#[tokio::test]
#[ignore]
async fn discovery_sweeps_the_loopback_range() {
    let cfg = EngineConfig::default();

    let report = discovery::discover("127.0.0.1/32", &cfg).await.unwrap();

    // Loopback answers the sweep. Whether it survives ranking depends on
    // a local sshd, so only the sweep count is asserted.
    assert_eq!(report.total_scanned, 1);
}

/// TEST-NET-3 is reserved and never answers. Needs `ping`, run on demand.
#[tokio::test]
#[ignore]
async fn discovery_of_a_dead_range_finds_nothing() {
    let cfg = EngineConfig::default();

    let report = discovery::discover("203.0.113.0/30", &cfg).await.unwrap();

    assert_eq!(report.total_scanned, 0);
    assert!(report.hosts.is_empty());
}

#[tokio::test]
async fn discovery_rejects_garbage_ranges() {
    let cfg = EngineConfig::default();

    assert!(discovery::discover("not-a-range", &cfg).await.is_err());
    assert!(discovery::discover("10.0.0.0/33", &cfg).await.is_err());
}
