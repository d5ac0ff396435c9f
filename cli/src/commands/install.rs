use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use colored::*;

use bedrock_common::config::EngineConfig;
use bedrock_common::install::{InstallPlan, Phase};
use bedrock_common::success;
use bedrock_core::install::Installer;
use bedrock_core::install::inventory::BECOME_PASSWORD_VAR;
use bedrock_core::install::runner::PlaybookRunner;

use crate::terminal::{print, spinner};

pub async fn install(
    plan_path: &Path,
    workdir: &Path,
    become_password: Option<&str>,
    cfg: &EngineConfig,
) -> anyhow::Result<()> {
    let text: String = tokio::fs::read_to_string(plan_path)
        .await
        .with_context(|| format!("failed to read plan {}", plan_path.display()))?;
    let plan: InstallPlan =
        serde_json::from_str(&text).context("installation plan is not valid JSON")?;

    // --become-password wins; the environment is the non-interactive path.
    let password: Option<String> = become_password
        .map(str::to_string)
        .or_else(|| std::env::var(BECOME_PASSWORD_VAR).ok());

    let runner = Arc::new(PlaybookRunner::new(cfg.runner_idle_timeout));
    let installer = Installer::new(runner, cfg.clone());
    let mut updates = installer.subscribe();

    let handle = installer
        .start(plan, workdir, password.as_deref())
        .await?;

    let bar = spinner::progress_bar();
    let mut printed_logs: usize = 0;
    while let Some(status) = updates.recv().await {
        bar.set_position(u64::from(status.progress));
        bar.set_message(format!("{} | {}", status.phase, status.current_task));
        for line in &status.logs[printed_logs..] {
            bar.println(format!("  {}", line.dimmed()));
        }
        printed_logs = status.logs.len();

        if status.phase.is_terminal() {
            break;
        }
    }
    bar.finish_and_clear();
    handle.await?;

    let final_status = installer.status();
    match final_status.phase {
        Phase::Completed => {
            print::fat_separator();
            success!("Installation complete");
            Ok(())
        }
        _ => {
            for error in &final_status.errors {
                print::print(&format!(" {} {}", "└─".bright_black(), error.red()));
            }
            bail!("installation failed")
        }
    }
}
