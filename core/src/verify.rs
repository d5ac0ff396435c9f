//! # Connectivity verification
//!
//! Confirms that a selected server is reachable and reports its OS and
//! hostname. The machine running the engine is verified directly (no SSH
//! to yourself); everything else goes over an SSH session, with `sshpass`
//! when a password is supplied. The caller always receives a well-formed
//! report; failures are values, never errors.

use std::net::IpAddr;

use bedrock_common::config::EngineConfig;
use bedrock_common::info;
use serde::Serialize;

use crate::exec::{CommandRunner, LocalRunner, SshRunner};
use crate::net::local;

#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityReport {
    pub connected: bool,
    pub message: String,
    pub os_info: Option<String>,
    pub hostname: Option<String>,
}

impl ConnectivityReport {
    fn failure(message: String) -> Self {
        Self {
            connected: false,
            message,
            os_info: None,
            hostname: None,
        }
    }
}

const OS_PROBE: &str = "lsb_release -d 2>/dev/null || grep PRETTY_NAME /etc/os-release";

/// Verifies connectivity to `address`, branching on locality.
pub async fn verify_connectivity(
    address: IpAddr,
    username: &str,
    password: Option<&str>,
    cfg: &EngineConfig,
) -> ConnectivityReport {
    if local::is_local_address(address).await {
        info!("{address} is this machine, verifying directly");
        let runner = LocalRunner::new(cfg.command_timeout);
        return verify_with(&runner, "Local machine (running the installer)").await;
    }

    let mut ssh = SshRunner::new(username, address, cfg.command_timeout);
    if let Some(password) = password {
        ssh = ssh.with_password(password);
    }

    // One cheap command proves the session works before the real probes.
    if let Err(e) = ssh.run("true").await {
        return ConnectivityReport::failure(format!("SSH connection failed: {e}"));
    }

    verify_with(&ssh, "SSH connection successful").await
}

async fn verify_with(runner: &dyn CommandRunner, message: &str) -> ConnectivityReport {
    let hostname: Option<String> = match runner.run("hostname").await {
        Ok(output) if !output.trim().is_empty() => Some(output.trim().to_string()),
        _ => None,
    };

    let os_info: Option<String> = match runner.run(OS_PROBE).await {
        Ok(output) => parse_os_description(&output),
        Err(_) => None,
    };

    ConnectivityReport {
        connected: true,
        message: message.to_string(),
        os_info,
        hostname,
    }
}

/// Extracts a human-readable OS description from either `lsb_release -d`
/// output (`Description:\tUbuntu 24.04.1 LTS`) or an os-release
/// `PRETTY_NAME="..."` line.
pub fn parse_os_description(output: &str) -> Option<String> {
    for line in output.lines() {
        if let Some(description) = line.strip_prefix("Description:") {
            let description = description.trim();
            if !description.is_empty() {
                return Some(description.to_string());
            }
        }
        if let Some(value) = line.trim().strip_prefix("PRETTY_NAME=") {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() {
                return Some(value.to_string());
            }
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
