//! # Installation orchestrator
//!
//! Drives an [`InstallPlan`] to completion: validates it, generates the
//! inventory, then walks phases and units in order, feeding every runner
//! event into the status hub. One run at a time; a finished run (completed
//! or failed) blocks further starts until an explicit reset.

pub mod inventory;
pub mod runner;
pub mod status;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::bail;
use bedrock_common::config::EngineConfig;
use bedrock_common::install::{InstallPlan, InstallationStatus, Phase};
use bedrock_common::{error, info, success};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use self::inventory::BECOME_PASSWORD_VAR;
use self::runner::{AutomationRunner, RunnerEvent};
use self::status::StatusHub;

pub struct Installer {
    hub: StatusHub,
    runner: Arc<dyn AutomationRunner>,
    cfg: EngineConfig,
}

impl Installer {
    pub fn new(runner: Arc<dyn AutomationRunner>, cfg: EngineConfig) -> Self {
        Self {
            hub: StatusHub::new(),
            runner,
            cfg,
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> InstallationStatus {
        self.hub.snapshot()
    }

    /// Observes every status change, starting with the current snapshot.
    pub fn subscribe(&self) -> UnboundedReceiver<InstallationStatus> {
        self.hub.subscribe()
    }

    /// Returns the status to idle. Refused while a run is in flight; the
    /// terminal states are exactly what this is for.
    pub fn reset(&self) -> anyhow::Result<()> {
        let phase: Phase = self.hub.snapshot().phase;
        if matches!(phase, Phase::Starting | Phase::Named(_)) {
            bail!("cannot reset while an installation is running");
        }
        self.hub.reset();
        Ok(())
    }

    /// Validates the plan, writes the inventory and launches the run.
    ///
    /// Returns the handle of the background task driving the run; callers
    /// that only care about progress can drop it and watch a subscription
    /// instead. The become password is passed to the runner through its
    /// environment and never written to disk.
    pub async fn start(
        &self,
        plan: InstallPlan,
        workdir: &Path,
        become_password: Option<&str>,
    ) -> anyhow::Result<JoinHandle<()>> {
        plan.validate()?;

        if !self.hub.try_begin() {
            bail!("an installation is already running or awaiting reset");
        }

        let inventory: PathBuf =
            match inventory::write_inventory(&plan, &self.cfg.ssh_user, workdir).await {
                Ok(path) => path,
                Err(e) => {
                    let reason: String = format!("inventory generation failed: {e:#}");
                    fail(&self.hub, reason.clone());
                    bail!(reason);
                }
            };

        let mut env: HashMap<String, String> = HashMap::new();
        if let Some(password) = become_password {
            env.insert(BECOME_PASSWORD_VAR.to_string(), password.to_string());
        }

        info!(
            "starting installation: {} nodes, {} units",
            plan.nodes.len(),
            plan.total_units()
        );

        let hub: StatusHub = self.hub.clone();
        let runner: Arc<dyn AutomationRunner> = Arc::clone(&self.runner);
        Ok(tokio::spawn(async move {
            run_plan(hub, runner, plan, inventory, env).await;
        }))
    }
}

/// The run loop. Progress is run-wide: after each unit it jumps to the
/// floor of `completed / total` in percent, so a two-phase plan with three
/// units reports 33, 66, 100.
async fn run_plan(
    hub: StatusHub,
    runner: Arc<dyn AutomationRunner>,
    plan: InstallPlan,
    inventory: PathBuf,
    env: HashMap<String, String>,
) {
    let total: usize = plan.total_units();
    let mut completed: usize = 0;

    for phase in plan.phases {
        let phase_name: String = phase.name.clone();
        hub.update(|status| {
            status.phase = Phase::Named(phase_name.clone());
            status.logs.push(format!("Entering phase: {phase_name}"));
        });

        for unit in phase.units {
            let task: String = unit.name.clone();
            let playbook: String = unit.playbook.clone();
            hub.update(|status| {
                status.current_task = task;
                status.logs.push(format!("Running {playbook}"));
            });

            let mut events = match runner.run_unit(&unit, &inventory, &env).await {
                Ok(rx) => rx,
                Err(e) => {
                    fail(&hub, format!("failed to launch {}: {e:#}", unit.playbook));
                    return;
                }
            };

            let mut finished: bool = false;
            while let Some(event) = events.recv().await {
                match event {
                    RunnerEvent::TaskStart { name } => {
                        let log: String = format!("TASK [{name}]");
                        hub.update(|status| {
                            status.current_task = name;
                            status.logs.push(log);
                        });
                    }
                    RunnerEvent::Output { line } => {
                        hub.update(|status| status.logs.push(line));
                    }
                    RunnerEvent::TaskFailed { detail } => {
                        hub.update(|status| status.errors.push(detail));
                    }
                    RunnerEvent::Completed => {
                        finished = true;
                        break;
                    }
                    RunnerEvent::Failed { reason } => {
                        fail(&hub, format!("{}: {reason}", unit.name));
                        return;
                    }
                    RunnerEvent::TimedOut => {
                        fail(
                            &hub,
                            format!("{} timed out: no output within the idle window", unit.name),
                        );
                        return;
                    }
                }
            }

            if !finished {
                fail(
                    &hub,
                    format!("{}: event stream ended without a result", unit.name),
                );
                return;
            }

            completed += 1;
            let percent: u8 = progress_percent(completed, total);
            hub.update(|status| {
                status.progress = percent;
                status.logs.push(format!("Completed {completed}/{total} units"));
            });
        }
    }

    success!("installation completed: {total} units");
    hub.update(|status| {
        status.phase = Phase::Completed;
        status.progress = 100;
        status.current_task = "Installation complete".to_string();
    });
}

fn progress_percent(completed: usize, total: usize) -> u8 {
    (completed * 100 / total) as u8
}

fn fail(hub: &StatusHub, reason: String) {
    error!("installation failed: {reason}");
    hub.update(|status| {
        status.errors.push(reason);
        status.phase = Phase::Failed;
    });
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
