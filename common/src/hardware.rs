//! # Hardware profile model
//!
//! The shape the hardware prober fills in, including the GPU/IOMMU
//! passthrough analysis. Every field has a documented default so a failed
//! probe leaves a well-formed profile behind.

use serde::Serialize;

/// IOMMU availability on the probed machine.
///
/// IOMMU can be absent entirely, present but with zero groups (VT-d/AMD-Vi
/// disabled in firmware), or active with groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IommuState {
    Disabled,
    NoGroups,
    Active,
}

/// Isolation status of the IOMMU group a GPU sits in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "other_devices")]
pub enum GroupIsolation {
    /// The group contains only the GPU and its own audio companion.
    Isolated,
    /// The group holds this many foreign devices.
    Shared(usize),
    /// The device exposes no IOMMU group link.
    NoGroup,
}

/// One NVIDIA display-class device and its passthrough analysis.
#[derive(Debug, Clone, Serialize)]
pub struct GpuRecord {
    pub pci_address: String,
    pub iommu_group: Option<String>,
    pub bound_driver: Option<String>,
    pub passthrough_eligible: bool,
    pub isolation: GroupIsolation,
}

/// Full hardware profile of one machine. Built once per probe, not cached.
#[derive(Debug, Clone, Serialize)]
pub struct HardwareProfile {
    pub cpu_cores: u32,
    pub cpu_model: String,
    pub architecture: String,
    /// Binary GiB, rounded to one decimal place.
    pub memory_gb: f64,
    /// Binary GiB, rounded to one decimal place.
    pub disk_gb: f64,
    pub gpu_detected: bool,
    pub gpu_count: usize,
    /// Human-readable summary, e.g. `"2x RTX 4090"` or
    /// `"1 visible + 1 VFIO-bound NVIDIA GPUs"`.
    pub gpu_summary: Option<String>,
    pub gpus: Vec<GpuRecord>,
    pub iommu: IommuState,
    pub passthrough_eligible_count: usize,
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self {
            cpu_cores: 0,
            cpu_model: "Unknown".to_string(),
            architecture: "unknown".to_string(),
            memory_gb: 0.0,
            disk_gb: 0.0,
            gpu_detected: false,
            gpu_count: 0,
            gpu_summary: None,
            gpus: Vec::new(),
            iommu: IommuState::Disabled,
            passthrough_eligible_count: 0,
        }
    }
}

/// Outcome of one full probe.
///
/// `failed_probes` names every introspection step that was attempted and
/// failed, so a zero in the profile can be told apart from a probe that
/// never produced a value.
#[derive(Debug, Clone, Serialize)]
pub struct HardwareReport {
    pub hardware: HardwareProfile,
    pub failed_probes: Vec<String>,
    /// Set when the probe as a whole could not run (e.g. unreachable host).
    pub error: Option<String>,
}

impl HardwareReport {
    /// The error shape: a zeroed profile carrying the failure message.
    pub fn failed(error: String) -> Self {
        Self {
            hardware: HardwareProfile::default(),
            failed_probes: Vec::new(),
            error: Some(error),
        }
    }
}
