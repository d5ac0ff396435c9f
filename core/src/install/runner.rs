//! # Automation runner
//!
//! Executes one automation unit at a time as an external `ansible-playbook`
//! process and translates its output stream into [`RunnerEvent`]s. The
//! orchestrator consumes events; it never touches the child process. A unit
//! that stops producing output for longer than the idle window is killed
//! and reported as timed out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bedrock_common::install::AutomationUnit;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::time::timeout;

/// One observable step in a unit's execution. Every stream ends with
/// exactly one terminal event: `Completed`, `Failed` or `TimedOut`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerEvent {
    /// The runner announced a named task.
    TaskStart { name: String },
    /// A plain output line, recorded verbatim.
    Output { line: String },
    /// A task reported failure; the unit may still recover or abort later.
    TaskFailed { detail: String },
    /// The unit finished successfully.
    Completed,
    /// The unit exited unsuccessfully.
    Failed { reason: String },
    /// The unit produced no output within the idle window and was killed.
    TimedOut,
}

/// Launches automation units and streams their events.
#[async_trait]
pub trait AutomationRunner: Send + Sync {
    async fn run_unit(
        &self,
        unit: &AutomationUnit,
        inventory: &Path,
        env: &HashMap<String, String>,
    ) -> anyhow::Result<Receiver<RunnerEvent>>;
}

/// The production runner: spawns `ansible-playbook` against the generated
/// inventory and watches both of its output pipes.
pub struct PlaybookRunner {
    program: PathBuf,
    idle_timeout: Duration,
}

impl PlaybookRunner {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("ansible-playbook"),
            idle_timeout,
        }
    }

    /// Overrides the executable the runner spawns.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl AutomationRunner for PlaybookRunner {
    async fn run_unit(
        &self,
        unit: &AutomationUnit,
        inventory: &Path,
        env: &HashMap<String, String>,
    ) -> anyhow::Result<Receiver<RunnerEvent>> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-i")
            .arg(inventory)
            .arg(&unit.playbook)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to launch runner for {}", unit.playbook))?;
        let stdout = child
            .stdout
            .take()
            .context("runner child has no stdout handle")?;
        let stderr = child
            .stderr
            .take()
            .context("runner child has no stderr handle")?;

        let (tx, rx): (Sender<RunnerEvent>, Receiver<RunnerEvent>) = mpsc::channel(256);
        let idle: Duration = self.idle_timeout;

        tokio::spawn(async move {
            let mut out_lines = BufReader::new(stdout).lines();
            let mut err_lines = BufReader::new(stderr).lines();
            let mut out_open: bool = true;
            let mut err_open: bool = true;

            // Both pipes must be drained: ansible routinely floods stderr
            // with warnings, and an unread pipe fills up and stalls the
            // child. A line on either pipe resets the idle window.
            while out_open || err_open {
                let step = timeout(idle, async {
                    tokio::select! {
                        line = out_lines.next_line(), if out_open => (line, true),
                        line = err_lines.next_line(), if err_open => (line, false),
                    }
                })
                .await;

                match step {
                    // Idle window elapsed with no output. Kill and report.
                    Err(_) => {
                        let _ = child.kill().await;
                        let _ = tx.send(RunnerEvent::TimedOut).await;
                        return;
                    }
                    Ok((Ok(Some(line)), _)) => {
                        if let Some(event) = parse_event(&line) {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Ok((Ok(None), from_stdout)) | Ok((Err(_), from_stdout)) => {
                        if from_stdout {
                            out_open = false;
                        } else {
                            err_open = false;
                        }
                    }
                }
            }

            let terminal: RunnerEvent = match child.wait().await {
                Ok(status) if status.success() => RunnerEvent::Completed,
                Ok(status) => RunnerEvent::Failed {
                    reason: format!("runner exited with {status}"),
                },
                Err(e) => RunnerEvent::Failed {
                    reason: format!("failed to collect runner exit status: {e}"),
                },
            };
            let _ = tx.send(terminal).await;
        });

        Ok(rx)
    }
}

/// Maps one output line to an event. Blank lines and banner separators are
/// dropped; everything unrecognized is carried through as plain output so
/// the log stays complete.
pub fn parse_event(line: &str) -> Option<RunnerEvent> {
    let trimmed: &str = line.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '*') {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix("TASK [") {
        if let Some((name, _)) = rest.split_once(']') {
            return Some(RunnerEvent::TaskStart {
                name: name.to_string(),
            });
        }
    }

    if trimmed.starts_with("fatal:") || trimmed.starts_with("failed:") {
        return Some(RunnerEvent::TaskFailed {
            detail: trimmed.to_string(),
        });
    }

    Some(RunnerEvent::Output {
        line: trimmed.to_string(),
    })
}

/// Deterministic runner for tests: plays back a fixed event sequence per
/// playbook. Units without a script complete immediately. Simulated runs
/// exist only here, never behind a runtime flag in production paths.
pub struct ScriptedAutomationRunner {
    scripts: HashMap<String, Vec<RunnerEvent>>,
}

impl ScriptedAutomationRunner {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
        }
    }

    /// Registers the event sequence played back for `playbook`.
    pub fn unit(mut self, playbook: &str, events: Vec<RunnerEvent>) -> Self {
        self.scripts.insert(playbook.to_string(), events);
        self
    }
}

impl Default for ScriptedAutomationRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AutomationRunner for ScriptedAutomationRunner {
    async fn run_unit(
        &self,
        unit: &AutomationUnit,
        _inventory: &Path,
        _env: &HashMap<String, String>,
    ) -> anyhow::Result<Receiver<RunnerEvent>> {
        let events: Vec<RunnerEvent> = self
            .scripts
            .get(&unit.playbook)
            .cloned()
            .unwrap_or_else(|| vec![RunnerEvent::Completed]);

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
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
