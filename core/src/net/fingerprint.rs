//! # SSH banner fingerprinting
//!
//! An SSH server sends its identification banner unprompted on connect, so
//! one TCP round trip is enough to classify a host. The classification
//! itself is a pure function of the banner string; the network step only
//! fetches the text.

use std::net::IpAddr;
use std::time::Duration;

use bedrock_common::network::host::Confidence;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// OpenSSH versions Ubuntu has shipped; a bare version match is a weaker
/// signal than the `Ubuntu` marker itself.
const UBUNTU_OPENSSH_VERSIONS: [&str; 4] =
    ["OpenSSH_8.9", "OpenSSH_9.0", "OpenSSH_9.3", "OpenSSH_9.6"];

/// Markers that rule a banner out as Ubuntu: other distros and common
/// router/firewall vendors.
const FOREIGN_MARKERS: [&str; 8] = [
    "Debian",
    "CentOS",
    "RHEL",
    "Alpine",
    "raspberrypi",
    "Cisco",
    "Mikrotik",
    "pfSense",
];

/// Result of fingerprinting one host.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub ssh_available: bool,
    pub banner: Option<String>,
    pub confidence: Confidence,
    pub os_guess: Option<String>,
}

/// Connects, reads the identification line, classifies it. Every failure
/// (refused, timed out, empty read) maps to the `Unknown`/unavailable
/// outcome; nothing is raised to the caller.
pub async fn fingerprint(address: IpAddr, port: u16, deadline: Duration) -> Fingerprint {
    let banner: Option<String> = read_banner(address, port, deadline).await;
    let (confidence, os_guess) = classify(banner.as_deref());

    Fingerprint {
        ssh_available: banner.is_some(),
        banner,
        confidence,
        os_guess,
    }
}

async fn read_banner(address: IpAddr, port: u16, deadline: Duration) -> Option<String> {
    let stream: TcpStream = timeout(deadline, TcpStream::connect((address, port)))
        .await
        .ok()?
        .ok()?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    timeout(deadline, reader.read_line(&mut line)).await.ok()?.ok()?;

    let banner = line.trim();
    if banner.is_empty() {
        None
    } else {
        Some(banner.to_string())
    }
}

/// Pure classification of a banner string into a confidence tier plus an
/// OS guess for display.
pub fn classify(banner: Option<&str>) -> (Confidence, Option<String>) {
    let Some(banner) = banner else {
        return (Confidence::Unknown, None);
    };

    if banner.contains("Ubuntu") {
        return (Confidence::Confirmed, Some(ubuntu_release_guess(banner)));
    }

    if UBUNTU_OPENSSH_VERSIONS
        .iter()
        .any(|version| banner.contains(version))
    {
        return (
            Confidence::Possible,
            Some("Likely Ubuntu (needs verification)".to_string()),
        );
    }

    let lowered: String = banner.to_lowercase();
    let foreign = FOREIGN_MARKERS
        .iter()
        .any(|marker| lowered.contains(&marker.to_lowercase()));

    if banner.contains("OpenSSH") && !foreign {
        return (
            Confidence::Possible,
            Some("Linux SSH server (needs verification)".to_string()),
        );
    }

    (Confidence::Unlikely, None)
}

/// Guesses the Ubuntu release from the packaging suffix, e.g.
/// `SSH-2.0-OpenSSH_9.6p1 Ubuntu-3ubuntu13.5` → 24.04.
fn ubuntu_release_guess(banner: &str) -> String {
    let Some((_, suffix)) = banner.split_once("Ubuntu-") else {
        return "Ubuntu (version unknown)".to_string();
    };

    if suffix.starts_with("3ubuntu") {
        "Ubuntu 24.04 LTS".to_string()
    } else if suffix.starts_with("2ubuntu") {
        "Ubuntu 22.04 LTS".to_string()
    } else if suffix.starts_with("1ubuntu") {
        "Ubuntu 20.04 LTS".to_string()
    } else {
        "Ubuntu (recent version)".to_string()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
