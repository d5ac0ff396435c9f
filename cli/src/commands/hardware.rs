use std::net::IpAddr;

use anyhow::bail;
use colored::*;

use bedrock_common::config::EngineConfig;
use bedrock_common::hardware::{GpuRecord, GroupIsolation, HardwareReport, IommuState};
use bedrock_common::{success, warn};
use bedrock_core::hardware;

use crate::terminal::{print, spinner};

type Detail = (String, ColoredString);

pub async fn hardware(address: IpAddr, user: &str, cfg: &EngineConfig) -> anyhow::Result<()> {
    let progress = spinner::start(format!("Probing {address}..."));
    let report: HardwareReport = hardware::probe_hardware(address, user, cfg).await;
    progress.finish_and_clear();

    if let Some(error) = &report.error {
        bail!("{error}");
    }

    for probe in &report.failed_probes {
        warn!("probe failed: {probe}");
    }

    let profile = &report.hardware;
    let mut details: Vec<Detail> = vec![
        ("CPU".to_string(), profile.cpu_model.as_str().into()),
        ("Cores".to_string(), profile.cpu_cores.to_string().cyan()),
        ("Arch".to_string(), profile.architecture.as_str().into()),
        (
            "Memory".to_string(),
            format!("{:.1} GiB", profile.memory_gb).cyan(),
        ),
        (
            "Disk".to_string(),
            format!("{:.1} GiB", profile.disk_gb).cyan(),
        ),
        ("IOMMU".to_string(), iommu_detail(profile.iommu)),
    ];

    match &profile.gpu_summary {
        Some(summary) => details.push(("GPU".to_string(), summary.as_str().green())),
        None => details.push(("GPU".to_string(), "none detected".dimmed())),
    }

    print::as_tree_one_level(details);

    for (idx, gpu) in profile.gpus.iter().enumerate() {
        print::print("");
        print_gpu_tree(idx, gpu);
    }

    if profile.gpu_detected {
        print::fat_separator();
        success!(
            "{} of {} GPUs eligible for passthrough",
            profile.passthrough_eligible_count,
            profile.gpu_count
        );
    }

    Ok(())
}

fn iommu_detail(state: IommuState) -> ColoredString {
    match state {
        IommuState::Active => "active".green(),
        IommuState::NoGroups => "enabled, no groups".yellow(),
        IommuState::Disabled => "disabled".red(),
    }
}

fn print_gpu_tree(idx: usize, gpu: &GpuRecord) {
    print::tree_head(idx, &gpu.pci_address);

    let mut details: Vec<Detail> = Vec::new();
    details.push((
        "Driver".to_string(),
        gpu.bound_driver.as_deref().unwrap_or("unbound").into(),
    ));
    if let Some(group) = &gpu.iommu_group {
        details.push(("Group".to_string(), group.as_str().cyan()));
    }
    details.push((
        "Isolation".to_string(),
        match &gpu.isolation {
            GroupIsolation::Isolated => "isolated".green(),
            GroupIsolation::Shared(n) => format!("shared with {n} devices").yellow(),
            GroupIsolation::NoGroup => "no group".red(),
        },
    ));
    details.push((
        "Eligible".to_string(),
        if gpu.passthrough_eligible {
            "yes".green().bold()
        } else {
            "no".red()
        },
    ));

    print::as_tree_one_level(details);
}
