//! # Inventory generation
//!
//! The automation runner needs an Ansible inventory naming every cluster
//! node under a `baremetal` group. The become password is never written to
//! disk; the inventory references the `ANSIBLE_BECOME_PASSWORD` environment
//! variable and the orchestrator exports it for the runner process only.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use bedrock_common::install::InstallPlan;

pub const INVENTORY_FILE: &str = "inventory.yaml";
pub const BECOME_PASSWORD_VAR: &str = "ANSIBLE_BECOME_PASSWORD";

/// Renders the inventory YAML for a plan. Nodes keep their discovered
/// hostname where one exists and fall back to an address-derived name.
pub fn render(plan: &InstallPlan, user: &str) -> String {
    let mut yaml = String::from("---\n");
    yaml.push_str("all:\n");
    yaml.push_str("  vars:\n");
    let _ = writeln!(
        yaml,
        "    ansible_become_pass: \"{{{{ lookup('env', '{BECOME_PASSWORD_VAR}') }}}}\""
    );
    yaml.push_str("  children:\n");
    yaml.push_str("    baremetal:\n");
    yaml.push_str("      hosts:\n");

    for node in &plan.nodes {
        let _ = writeln!(yaml, "        {}:", node.inventory_name());
        let _ = writeln!(yaml, "          ansible_host: {}", node.ip);
        let _ = writeln!(yaml, "          ansible_user: {user}");
    }

    yaml
}

/// Writes the rendered inventory under `dir` and returns its path.
pub async fn write_inventory(
    plan: &InstallPlan,
    user: &str,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create working directory {}", dir.display()))?;

    let path: PathBuf = dir.join(INVENTORY_FILE);
    tokio::fs::write(&path, render(plan, user))
        .await
        .with_context(|| format!("failed to write inventory {}", path.display()))?;

    Ok(path)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
