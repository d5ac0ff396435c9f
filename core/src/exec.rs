//! # Command execution boundary
//!
//! One abstraction for "run this command, capture its text", parameterized
//! by locality: a local subprocess or an SSH session. Probing code depends
//! only on [`CommandRunner`], so every parser in this crate can be exercised
//! against scripted output without touching a real machine.

use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use bedrock_common::config::EngineConfig;
use tokio::process::Command;
use tokio::time::timeout;

use crate::net::local;

/// Executes a shell command and returns its trimmed stdout.
///
/// An `Err` means the command could not produce a value: spawn failure,
/// non-zero exit, or deadline exceeded. Callers treat that as "probe
/// attempted and failed" and fall back to their documented defaults.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> anyhow::Result<String>;
}

/// Runs commands on the machine hosting the engine.
pub struct LocalRunner {
    deadline: Duration,
}

impl LocalRunner {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, command: &str) -> anyhow::Result<String> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        capture(cmd, self.deadline).await
    }
}

/// Runs commands on a remote host over SSH.
///
/// Key-based auth uses `BatchMode` so a missing key fails instead of
/// prompting; a password switches to `sshpass`.
pub struct SshRunner {
    user: String,
    host: IpAddr,
    password: Option<String>,
    deadline: Duration,
}

impl SshRunner {
    pub fn new(user: &str, host: IpAddr, deadline: Duration) -> Self {
        Self {
            user: user.to_string(),
            host,
            password: None,
            deadline,
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    fn build_command(&self, remote_command: &str) -> Command {
        let destination: String = format!("{}@{}", self.user, self.host);
        let mut cmd = match &self.password {
            Some(password) => {
                let mut c = Command::new("sshpass");
                c.arg("-p").arg(password).arg("ssh");
                c
            }
            None => {
                let mut c = Command::new("ssh");
                c.arg("-o").arg("BatchMode=yes");
                c
            }
        };
        cmd.arg("-o")
            .arg("ConnectTimeout=5")
            .arg("-o")
            .arg("StrictHostKeyChecking=no")
            .arg("-o")
            .arg("UserKnownHostsFile=/dev/null")
            .arg(destination)
            .arg(remote_command);
        cmd
    }
}

#[async_trait]
impl CommandRunner for SshRunner {
    async fn run(&self, command: &str) -> anyhow::Result<String> {
        capture(self.build_command(command), self.deadline).await
    }
}

/// Picks the execution locality for a target address once, via the
/// local-address resolver.
pub async fn runner_for(
    target: IpAddr,
    user: &str,
    cfg: &EngineConfig,
) -> Box<dyn CommandRunner> {
    if local::is_local_address(target).await {
        Box::new(LocalRunner::new(cfg.command_timeout))
    } else {
        Box::new(SshRunner::new(user, target, cfg.command_timeout))
    }
}

async fn capture(mut cmd: Command, deadline: Duration) -> anyhow::Result<String> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = timeout(deadline, cmd.output())
        .await
        .context("command deadline exceeded")?
        .context("failed to spawn command")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("command exited with {}: {}", output.status, stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Deterministic runner for tests: answers commands from a fixed script.
///
/// Canned probe output lives here and only here, never behind a runtime
/// flag in a production code path.
pub struct ScriptedRunner {
    entries: Vec<(String, anyhow::Result<String>)>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers the output returned for any command containing `pattern`.
    /// Entries are matched in registration order.
    pub fn on(mut self, pattern: &str, output: &str) -> Self {
        self.entries
            .push((pattern.to_string(), Ok(output.to_string())));
        self
    }

    /// Registers a failure for any command containing `pattern`.
    pub fn failing(mut self, pattern: &str, reason: &str) -> Self {
        self.entries
            .push((pattern.to_string(), Err(anyhow::anyhow!(reason.to_string()))));
        self
    }
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str) -> anyhow::Result<String> {
        for (pattern, response) in &self.entries {
            if command.contains(pattern.as_str()) {
                return match response {
                    Ok(output) => Ok(output.clone()),
                    Err(e) => Err(anyhow::anyhow!("{e}")),
                };
            }
        }
        bail!("no scripted output for command: {command}")
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
