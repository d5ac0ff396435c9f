//! # Installation plan and status models
//!
//! The plan describes what the orchestrator will run: an ordered list of
//! named phases, each owning an ordered list of automation units, plus the
//! cluster nodes the inventory is generated from. The status object is the
//! single process-wide record of a run, mutated only by the orchestrator
//! and pushed to subscribers on every change.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize, Serializer};

/// Where the installation currently stands.
///
/// Transitions are strictly forward: `Idle → Starting → phase₁ → … →
/// {Completed | Failed}`. The terminal states are only left via an
/// explicit reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Starting,
    Named(String),
    Completed,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::Starting => f.write_str("starting"),
            Phase::Named(name) => f.write_str(name),
            Phase::Completed => f.write_str("completed"),
            Phase::Failed => f.write_str("failed"),
        }
    }
}

impl Serialize for Phase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The one status object observers see. Logs and errors are append-only.
#[derive(Debug, Clone, Serialize)]
pub struct InstallationStatus {
    pub phase: Phase,
    /// Percent complete across the whole run, `0..=100`, never decreasing.
    pub progress: u8,
    pub current_task: String,
    pub logs: Vec<String>,
    pub errors: Vec<String>,
}

impl InstallationStatus {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            progress: 0,
            current_task: String::new(),
            logs: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl Default for InstallationStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Kubernetes role a node takes in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    ControlPlane,
    Worker,
}

/// One machine participating in the installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterNode {
    pub ip: IpAddr,
    pub hostname: Option<String>,
    pub role: NodeRole,
}

impl ClusterNode {
    /// Name the node is listed under in the generated inventory. Nodes
    /// without a hostname get a name derived from their address.
    pub fn inventory_name(&self) -> String {
        match &self.hostname {
            Some(name) => name.clone(),
            None => format!("server-{}", self.ip.to_string().replace('.', "-")),
        }
    }
}

/// One externally executed configuration task within a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationUnit {
    /// Human-readable name, shown as the current task while the unit runs.
    pub name: String,
    /// Playbook reference handed to the automation runner.
    pub playbook: String,
}

/// An ordered group of automation units executed under one phase name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookPhase {
    pub name: String,
    pub units: Vec<AutomationUnit>,
}

/// A plan that fails validation, reported before orchestration begins.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("exactly one control plane node required, found {found}")]
    ControlPlaneCount { found: usize },
    #[error("at least one worker node required")]
    NoWorkers,
    #[error("installation plan contains no automation units")]
    NoUnits,
}

/// The full installation plan, fixed at orchestration start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallPlan {
    pub nodes: Vec<ClusterNode>,
    pub phases: Vec<PlaybookPhase>,
}

impl InstallPlan {
    pub fn total_units(&self) -> usize {
        self.phases.iter().map(|phase| phase.units.len()).sum()
    }

    /// Checks the structural requirements before any phase runs.
    pub fn validate(&self) -> Result<(), PlanError> {
        let control_planes: usize = self
            .nodes
            .iter()
            .filter(|node| node.role == NodeRole::ControlPlane)
            .count();
        if control_planes != 1 {
            return Err(PlanError::ControlPlaneCount {
                found: control_planes,
            });
        }

        let workers: usize = self
            .nodes
            .iter()
            .filter(|node| node.role == NodeRole::Worker)
            .count();
        if workers < 1 {
            return Err(PlanError::NoWorkers);
        }

        if self.total_units() == 0 {
            return Err(PlanError::NoUnits);
        }

        Ok(())
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
