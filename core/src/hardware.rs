//! # Hardware and IOMMU introspection
//!
//! Runs a fixed battery of introspection commands against a target (locally
//! or over SSH, decided once via the local-address resolver) and assembles a
//! [`HardwareProfile`], including the GPU passthrough analysis.
//!
//! Every command is independently best-effort: a failure leaves the field at
//! its documented default and is recorded in `failed_probes`, so callers can
//! tell "attempted and failed" from a genuine zero. All text scraping lives
//! in the pure [`parse`] module; the command layer only captures output.

use std::collections::HashMap;
use std::net::IpAddr;

use bedrock_common::config::EngineConfig;
use bedrock_common::hardware::{
    GpuRecord, GroupIsolation, HardwareProfile, HardwareReport, IommuState,
};
use bedrock_common::info;

use crate::exec::{self, CommandRunner};

/// Probes `address` and returns the report. Never fails: an unreachable or
/// broken host surfaces as the error shape with a zeroed profile.
pub async fn probe_hardware(
    address: IpAddr,
    username: &str,
    cfg: &EngineConfig,
) -> HardwareReport {
    let runner = exec::runner_for(address, username, cfg).await;
    info!("probing hardware of {address}");
    probe_with(runner.as_ref()).await
}

/// The probe battery against an arbitrary execution boundary.
pub async fn probe_with(runner: &dyn CommandRunner) -> HardwareReport {
    let mut profile = HardwareProfile::default();
    let mut failed: Vec<String> = Vec::new();

    match runner.run("nproc").await.ok().as_deref().and_then(parse::core_count) {
        Some(cores) => profile.cpu_cores = cores,
        None => failed.push("cpu_cores".to_string()),
    }

    match runner.run("cat /proc/cpuinfo").await {
        Ok(output) => match parse::cpu_model(&output) {
            Some(model) => profile.cpu_model = model,
            None => failed.push("cpu_model".to_string()),
        },
        Err(_) => failed.push("cpu_model".to_string()),
    }

    match runner.run("uname -m").await {
        Ok(output) if !output.trim().is_empty() => {
            profile.architecture = output.trim().to_string();
        }
        _ => failed.push("architecture".to_string()),
    }

    match runner.run("free -b").await.ok().as_deref().and_then(parse::memory_total_bytes) {
        Some(bytes) => profile.memory_gb = parse::to_gib(bytes),
        None => failed.push("memory".to_string()),
    }

    match runner.run("df -B1 /").await.ok().as_deref().and_then(parse::disk_total_bytes) {
        Some(bytes) => profile.disk_gb = parse::to_gib(bytes),
        None => failed.push("disk".to_string()),
    }

    // A host where not a single base probe produced a value is unreachable
    // or unusable; return the explicit error shape instead of a profile
    // that is indistinguishable from a tiny machine.
    if failed.len() == 5 {
        return HardwareReport::failed(
            "hardware detection failed: no introspection command succeeded".to_string(),
        );
    }

    probe_gpus(runner, &mut profile, &mut failed).await;

    HardwareReport {
        hardware: profile,
        failed_probes: failed,
        error: None,
    }
}

async fn probe_gpus(
    runner: &dyn CommandRunner,
    profile: &mut HardwareProfile,
    failed: &mut Vec<String>,
) {
    let devices: Vec<parse::PciDevice> = match runner.run("lspci").await {
        Ok(output) => parse::nvidia_display_devices(&output),
        Err(_) => {
            failed.push("gpu_enumeration".to_string());
            Vec::new()
        }
    };

    if devices.is_empty() {
        return;
    }

    let drivers: HashMap<String, String> = match runner.run("lspci -k").await {
        Ok(output) => parse::bound_drivers(&output),
        Err(_) => {
            failed.push("gpu_drivers".to_string());
            HashMap::new()
        }
    };

    profile.iommu = match runner.run("ls -1 /sys/kernel/iommu_groups").await {
        Err(_) => IommuState::Disabled,
        Ok(listing) if listing.trim().is_empty() => IommuState::NoGroups,
        Ok(_) => IommuState::Active,
    };

    let mut visible_models: Vec<String> = Vec::new();
    let mut vfio_models: Vec<String> = Vec::new();

    for device in devices {
        let driver: Option<String> = drivers.get(&device.address).cloned();
        let vfio_bound = driver.as_deref() == Some("vfio-pci");

        if vfio_bound {
            vfio_models.push(device.model.clone());
        } else {
            visible_models.push(device.model.clone());
        }

        let (group, isolation) = if profile.iommu == IommuState::Active {
            resolve_isolation(runner, &device.address).await
        } else {
            (None, GroupIsolation::NoGroup)
        };

        let eligible = isolation == GroupIsolation::Isolated;
        if eligible {
            profile.passthrough_eligible_count += 1;
        }

        profile.gpus.push(GpuRecord {
            pci_address: device.address,
            iommu_group: group,
            bound_driver: driver,
            passthrough_eligible: eligible,
            isolation,
        });
    }

    profile.gpu_detected = true;
    profile.gpu_count = profile.gpus.len();
    profile.gpu_summary = parse::summarize_gpus(&visible_models, &vfio_models);
}

/// Resolves a GPU's IOMMU group and checks whether any device other than
/// the GPU itself and its own NVIDIA audio companion shares it.
async fn resolve_isolation(
    runner: &dyn CommandRunner,
    address: &str,
) -> (Option<String>, GroupIsolation) {
    let sysfs = parse::sysfs_address(address);

    let link = match runner
        .run(&format!("readlink /sys/bus/pci/devices/{sysfs}/iommu_group"))
        .await
    {
        Ok(link) => link,
        Err(_) => return (None, GroupIsolation::NoGroup),
    };

    let Some(group) = parse::iommu_group_id(&link) else {
        return (None, GroupIsolation::NoGroup);
    };

    let members: String = runner
        .run(&format!("ls -1 /sys/kernel/iommu_groups/{group}/devices"))
        .await
        .unwrap_or_default();

    let mut foreign: usize = 0;
    for member in members.split_whitespace() {
        if member == sysfs {
            continue;
        }
        let numeric = runner
            .run(&format!("lspci -n -s {member}"))
            .await
            .unwrap_or_default();
        if !parse::is_nvidia_audio(&numeric) {
            foreign += 1;
        }
    }

    let isolation = if foreign == 0 {
        GroupIsolation::Isolated
    } else {
        GroupIsolation::Shared(foreign)
    };

    (Some(group), isolation)
}

/// Pure text parsers for the introspection command outputs.
pub mod parse {
    use std::collections::HashMap;

    /// PCI class/vendor prefix of an NVIDIA HDMI audio function.
    const NVIDIA_AUDIO_SIGNATURE: &str = " 0403: 10de:";

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PciDevice {
        pub address: String,
        pub model: String,
    }

    pub fn core_count(output: &str) -> Option<u32> {
        output.trim().parse().ok()
    }

    /// First `model name` line of `/proc/cpuinfo`.
    pub fn cpu_model(output: &str) -> Option<String> {
        output
            .lines()
            .find(|line| line.starts_with("model name"))
            .and_then(|line| line.split_once(':'))
            .map(|(_, model)| model.trim().to_string())
            .filter(|model| !model.is_empty())
    }

    /// Total column of the `Mem:` row in `free -b` output.
    pub fn memory_total_bytes(output: &str) -> Option<u64> {
        output
            .lines()
            .find(|line| line.starts_with("Mem:"))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|total| total.parse().ok())
    }

    /// Size column of the last row of `df -B1 /` output.
    pub fn disk_total_bytes(output: &str) -> Option<u64> {
        output
            .lines()
            .last()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|total| total.parse().ok())
    }

    /// Bytes to binary GiB, one decimal place.
    pub fn to_gib(bytes: u64) -> f64 {
        (bytes as f64 / 1_073_741_824.0 * 10.0).round() / 10.0
    }

    /// NVIDIA display-class devices (VGA / 3D / Display controllers) from
    /// plain `lspci` output. Audio functions and other vendors are skipped.
    pub fn nvidia_display_devices(output: &str) -> Vec<PciDevice> {
        output
            .lines()
            .filter(|line| {
                let lowered = line.to_lowercase();
                lowered.contains("nvidia")
                    && (lowered.contains("vga compatible controller")
                        || lowered.contains("3d controller")
                        || lowered.contains("display controller"))
            })
            .filter_map(|line| {
                let address = line.split_whitespace().next()?;
                Some(PciDevice {
                    address: address.to_string(),
                    model: gpu_model(line),
                })
            })
            .collect()
    }

    /// Extracts a marketable model name from an lspci line: bracketed name
    /// when present, otherwise whatever follows `NVIDIA Corporation`.
    fn gpu_model(line: &str) -> String {
        if let (Some(start), Some(end)) = (line.find('['), line.find(']')) {
            if start < end {
                return line[start + 1..end].trim().to_string();
            }
        }
        if let Some((_, rest)) = line.split_once("NVIDIA Corporation") {
            let model = rest.split('(').next().unwrap_or(rest).trim();
            if !model.is_empty() {
                return model.to_string();
            }
        }
        "NVIDIA GPU".to_string()
    }

    /// Maps PCI address to the kernel driver in use, from `lspci -k`.
    pub fn bound_drivers(output: &str) -> HashMap<String, String> {
        let mut drivers: HashMap<String, String> = HashMap::new();
        let mut current: Option<String> = None;

        for line in output.lines() {
            if !line.starts_with(char::is_whitespace) {
                current = line.split_whitespace().next().map(|addr| addr.to_string());
            } else if let Some((_, driver)) = line.trim().split_once("Kernel driver in use:") {
                if let Some(address) = &current {
                    drivers.insert(address.clone(), driver.trim().to_string());
                }
            }
        }

        drivers
    }

    /// Group id from the sysfs `iommu_group` symlink target, e.g.
    /// `../../../kernel/iommu_groups/14` → `14`.
    pub fn iommu_group_id(link: &str) -> Option<String> {
        let id = link.trim().rsplit('/').next()?;
        (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| id.to_string())
    }

    /// True if a `lspci -n -s` line describes an NVIDIA audio function
    /// (class 0403, vendor 10de). The GPU's own companion does not count
    /// against group isolation.
    pub fn is_nvidia_audio(numeric_line: &str) -> bool {
        numeric_line.contains(NVIDIA_AUDIO_SIGNATURE)
    }

    /// Domain-qualifies a short PCI address for sysfs lookups.
    pub fn sysfs_address(address: &str) -> String {
        if address.matches(':').count() >= 2 {
            address.to_string()
        } else {
            format!("0000:{address}")
        }
    }

    /// Human-readable summary of visible vs VFIO-bound GPU counts, named
    /// and pluralized the way operators expect to read it.
    pub fn summarize_gpus(visible: &[String], vfio: &[String]) -> Option<String> {
        match (visible.len(), vfio.len()) {
            (0, 0) => None,
            (1, 1) => Some(format!("{} + 1 VFIO-bound", visible[0])),
            (v @ 1.., f @ 1..) => {
                Some(format!("{v} visible + {f} VFIO-bound NVIDIA GPUs"))
            }
            (1, 0) => Some(visible[0].clone()),
            (v, 0) => {
                if visible.iter().all(|model| model == &visible[0]) {
                    Some(format!("{v}x {}", visible[0]))
                } else {
                    Some(format!("{v} NVIDIA GPUs: {}", visible.join(", ")))
                }
            }
            (0, 1) => Some(format!("{} (VFIO-bound)", vfio[0])),
            (0, f) => Some(format!("{f} NVIDIA GPUs (all VFIO-bound)")),
        }
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

#[cfg(test)]
mod tests {
    use super::parse::*;
    use super::*;
    use crate::exec::ScriptedRunner;

    const LSPCI: &str = "\
00:02.0 VGA compatible controller: Intel Corporation AlderLake-S GT1 (rev 0c)
01:00.0 VGA compatible controller: NVIDIA Corporation GA102 [GeForce RTX 3090] (rev a1)
01:00.1 Audio device: NVIDIA Corporation GA102 High Definition Audio Controller (rev a1)
02:00.0 3D controller: NVIDIA Corporation GP104GL [Tesla P4] (rev a1)
03:00.0 Ethernet controller: Intel Corporation I210 Gigabit Network Connection";

    const LSPCI_K: &str = "\
01:00.0 VGA compatible controller: NVIDIA Corporation GA102 [GeForce RTX 3090] (rev a1)
\tSubsystem: ASUSTeK Computer Inc. GA102
\tKernel driver in use: nvidia
\tKernel modules: nouveau, nvidia
02:00.0 3D controller: NVIDIA Corporation GP104GL [Tesla P4] (rev a1)
\tSubsystem: NVIDIA Corporation GP104GL
\tKernel driver in use: vfio-pci
\tKernel modules: nouveau, nvidia";

    const FREE_B: &str = "\
               total        used        free      shared  buff/cache   available
Mem:     67108864000  1234567890  4567890123      123456  9876543210  5432109876
Swap:     2147483648           0  2147483648";

    const DF_B1: &str = "\
Filesystem        1B-blocks         Used    Available Use% Mounted on
/dev/nvme0n1p2 982820896768 123456789012 809364107756  14% /";

    #[test]
    fn core_count_parses_digits_only() {
        assert_eq!(core_count("16\n"), Some(16));
        assert_eq!(core_count("garbage"), None);
    }

    #[test]
    fn cpu_model_comes_from_first_model_name_line() {
        let cpuinfo = "processor\t: 0\nvendor_id\t: AuthenticAMD\n\
                       model name\t: AMD Ryzen 9 5950X 16-Core Processor\n\
                       model name\t: should not matter\n";
        assert_eq!(
            cpu_model(cpuinfo).as_deref(),
            Some("AMD Ryzen 9 5950X 16-Core Processor")
        );
        assert_eq!(cpu_model("no such line"), None);
    }

    #[test]
    fn memory_and_disk_totals_are_extracted() {
        assert_eq!(memory_total_bytes(FREE_B), Some(67_108_864_000));
        assert_eq!(disk_total_bytes(DF_B1), Some(982_820_896_768));
        assert_eq!(memory_total_bytes(""), None);
        assert_eq!(disk_total_bytes(""), None);
    }

    #[test]
    fn gib_conversion_rounds_to_one_decimal() {
        assert_eq!(to_gib(1_073_741_824), 1.0);
        assert_eq!(to_gib(67_108_864_000), 62.5);
        assert_eq!(to_gib(0), 0.0);
    }

    #[test]
    fn only_nvidia_display_devices_are_enumerated() {
        let devices = nvidia_display_devices(LSPCI);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].address, "01:00.0");
        assert_eq!(devices[0].model, "GeForce RTX 3090");
        assert_eq!(devices[1].address, "02:00.0");
        assert_eq!(devices[1].model, "Tesla P4");
    }

    #[test]
    fn drivers_are_mapped_per_device() {
        let drivers = bound_drivers(LSPCI_K);
        assert_eq!(drivers.get("01:00.0").map(String::as_str), Some("nvidia"));
        assert_eq!(drivers.get("02:00.0").map(String::as_str), Some("vfio-pci"));
    }

    #[test]
    fn iommu_group_link_resolves_to_id() {
        assert_eq!(
            iommu_group_id("../../../kernel/iommu_groups/14"),
            Some("14".to_string())
        );
        assert_eq!(iommu_group_id(""), None);
        assert_eq!(iommu_group_id("../../garbage/abc"), None);
    }

    #[test]
    fn audio_companion_signature_is_detected() {
        assert!(is_nvidia_audio("01:00.1 0403: 10de:1aef (rev a1)"));
        // Intel audio and NVIDIA display functions do not match.
        assert!(!is_nvidia_audio("00:1f.3 0403: 8086:a170"));
        assert!(!is_nvidia_audio("01:00.0 0300: 10de:2204 (rev a1)"));
    }

    #[test]
    fn sysfs_addresses_are_domain_qualified() {
        assert_eq!(sysfs_address("01:00.0"), "0000:01:00.0");
        assert_eq!(sysfs_address("0000:01:00.0"), "0000:01:00.0");
    }

    #[test]
    fn gpu_summaries_cover_the_mix_of_categories() {
        let rtx = "GeForce RTX 3090".to_string();
        let p4 = "Tesla P4".to_string();

        assert_eq!(summarize_gpus(&[], &[]), None);
        assert_eq!(summarize_gpus(&[rtx.clone()], &[]).as_deref(), Some("GeForce RTX 3090"));
        assert_eq!(
            summarize_gpus(&[rtx.clone(), rtx.clone()], &[]).as_deref(),
            Some("2x GeForce RTX 3090")
        );
        assert_eq!(
            summarize_gpus(&[rtx.clone(), p4.clone()], &[]).as_deref(),
            Some("2 NVIDIA GPUs: GeForce RTX 3090, Tesla P4")
        );
        assert_eq!(
            summarize_gpus(&[rtx.clone()], &[p4.clone()]).as_deref(),
            Some("GeForce RTX 3090 + 1 VFIO-bound")
        );
        assert_eq!(
            summarize_gpus(&[rtx.clone(), rtx.clone()], &[p4.clone()]).as_deref(),
            Some("2 visible + 1 VFIO-bound NVIDIA GPUs")
        );
        assert_eq!(
            summarize_gpus(&[rtx.clone(), rtx.clone()], &[p4.clone(), p4.clone()]).as_deref(),
            Some("2 visible + 2 VFIO-bound NVIDIA GPUs")
        );
        assert_eq!(
            summarize_gpus(&[], &[p4.clone()]).as_deref(),
            Some("Tesla P4 (VFIO-bound)")
        );
        assert_eq!(
            summarize_gpus(&[], &[p4.clone(), p4.clone()]).as_deref(),
            Some("2 NVIDIA GPUs (all VFIO-bound)")
        );
    }

    fn base_script() -> ScriptedRunner {
        ScriptedRunner::new()
            .on("nproc", "32")
            .on("cat /proc/cpuinfo", "model name\t: AMD Ryzen 9 5950X 16-Core Processor")
            .on("uname -m", "x86_64")
            .on("free -b", FREE_B)
            .on("df -B1 /", DF_B1)
    }

    #[tokio::test]
    async fn isolated_gpu_is_passthrough_eligible() {
        let runner = base_script()
            .on("lspci -k", LSPCI_K)
            .on(
                "readlink /sys/bus/pci/devices/0000:01:00.0/iommu_group",
                "../../../kernel/iommu_groups/14",
            )
            .on(
                "readlink /sys/bus/pci/devices/0000:02:00.0/iommu_group",
                "../../../kernel/iommu_groups/15",
            )
            .on(
                "ls -1 /sys/kernel/iommu_groups/14/devices",
                "0000:01:00.0\n0000:01:00.1",
            )
            .on("ls -1 /sys/kernel/iommu_groups/15/devices", "0000:02:00.0")
            .on("ls -1 /sys/kernel/iommu_groups", "0\n1\n14\n15")
            .on("lspci -n -s 0000:01:00.1", "01:00.1 0403: 10de:1aef (rev a1)")
            .on("lspci", LSPCI);

        let report = probe_with(&runner).await;
        assert!(report.error.is_none());
        assert!(report.failed_probes.is_empty());

        let hw = &report.hardware;
        assert_eq!(hw.cpu_cores, 32);
        assert_eq!(hw.architecture, "x86_64");
        assert_eq!(hw.memory_gb, 62.5);
        assert!(hw.gpu_detected);
        assert_eq!(hw.gpu_count, 2);
        assert_eq!(hw.iommu, IommuState::Active);
        // RTX group holds only the GPU and its audio companion; the P4
        // group holds only the GPU. Both are isolated.
        assert_eq!(hw.passthrough_eligible_count, 2);
        assert!(hw.gpus.iter().all(|gpu| gpu.passthrough_eligible));
        assert_eq!(
            hw.gpu_summary.as_deref(),
            Some("GeForce RTX 3090 + 1 VFIO-bound")
        );
    }

    #[tokio::test]
    async fn shared_group_blocks_passthrough() {
        let runner = base_script()
            .on("lspci -k", LSPCI_K)
            .on(
                "readlink /sys/bus/pci/devices/0000:01:00.0/iommu_group",
                "../../../kernel/iommu_groups/14",
            )
            .failing("readlink /sys/bus/pci/devices/0000:02:00.0/iommu_group", "no link")
            .on(
                "ls -1 /sys/kernel/iommu_groups/14/devices",
                "0000:01:00.0\n0000:01:00.1\n0000:03:00.0",
            )
            .on("ls -1 /sys/kernel/iommu_groups", "0\n14")
            .on("lspci -n -s 0000:01:00.1", "01:00.1 0403: 10de:1aef (rev a1)")
            .on("lspci -n -s 0000:03:00.0", "03:00.0 0200: 8086:1533 (rev 03)")
            .on("lspci", LSPCI);

        let report = probe_with(&runner).await;
        let hw = &report.hardware;

        assert_eq!(hw.passthrough_eligible_count, 0);
        assert_eq!(hw.gpus[0].isolation, GroupIsolation::Shared(1));
        assert!(!hw.gpus[0].passthrough_eligible);
        assert_eq!(hw.gpus[1].isolation, GroupIsolation::NoGroup);
    }

    #[tokio::test]
    async fn missing_iommu_support_is_reported() {
        let runner = base_script()
            .on("lspci -k", LSPCI_K)
            .failing("ls -1 /sys/kernel/iommu_groups", "No such file or directory")
            .on("lspci", LSPCI);

        let report = probe_with(&runner).await;
        assert_eq!(report.hardware.iommu, IommuState::Disabled);
        assert_eq!(report.hardware.passthrough_eligible_count, 0);
        assert!(report.hardware.gpus.iter().all(|gpu| !gpu.passthrough_eligible));
    }

    #[tokio::test]
    async fn host_without_gpus_keeps_defaults() {
        let runner = base_script().on("lspci", LSPCI.lines().next().unwrap());

        let report = probe_with(&runner).await;
        let hw = &report.hardware;
        assert!(!hw.gpu_detected);
        assert_eq!(hw.gpu_count, 0);
        assert!(hw.gpu_summary.is_none());
    }

    #[tokio::test]
    async fn partial_failure_is_visible_not_silent() {
        let runner = ScriptedRunner::new()
            .on("nproc", "8")
            .on("cat /proc/cpuinfo", "model name : Intel i7")
            .on("uname -m", "x86_64")
            .failing("free -b", "unreachable")
            .on("df -B1 /", DF_B1)
            .failing("lspci", "unreachable");

        let report = probe_with(&runner).await;
        assert!(report.error.is_none());
        assert_eq!(report.hardware.memory_gb, 0.0);
        assert!(report.failed_probes.contains(&"memory".to_string()));
        assert!(report.failed_probes.contains(&"gpu_enumeration".to_string()));
    }

    #[tokio::test]
    async fn unreachable_host_returns_error_shape() {
        let runner = ScriptedRunner::new();

        let report = probe_with(&runner).await;
        assert!(report.error.is_some());
        assert_eq!(report.hardware.cpu_cores, 0);
        assert_eq!(report.hardware.cpu_model, "Unknown");
        assert_eq!(report.hardware.architecture, "unknown");
    }
}
