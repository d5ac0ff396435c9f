use colored::*;

use bedrock_common::config::EngineConfig;
use bedrock_common::network::host::{CandidateHost, Confidence};
use bedrock_common::success;
use bedrock_core::discovery::{self, DiscoveryReport};

use crate::terminal::{print, spinner};

type Detail = (String, ColoredString);

pub async fn discover(cidr: &str, cfg: &EngineConfig) -> anyhow::Result<()> {
    let progress = spinner::start(format!("Sweeping {cidr}..."));
    let report: DiscoveryReport = discovery::discover(cidr, cfg).await?;
    progress.finish_and_clear();

    if report.hosts.is_empty() {
        print::header("zero candidates detected");
        print::centerln(&format!(
            "{} addresses answered, none looked installable",
            report.total_scanned
        ));
        return Ok(());
    }

    print::header("installation candidates");
    for (idx, host) in report.hosts.iter().enumerate() {
        print_host_tree(idx, host);
        if idx + 1 != report.hosts.len() {
            print::print("");
        }
    }
    print_summary(&report);
    Ok(())
}

fn print_host_tree(idx: usize, host: &CandidateHost) {
    let name: &str = host.hostname.as_deref().unwrap_or("No hostname");
    print::tree_head(idx, name);

    let mut details: Vec<Detail> = vec![
        ("IPv4".to_string(), host.ip.to_string().cyan()),
        (
            "SSH".to_string(),
            if host.ssh_available {
                "open".green()
            } else {
                "closed".red()
            },
        ),
        ("Class".to_string(), confidence_detail(host.confidence)),
    ];

    if let Some(os) = &host.os_guess {
        details.push(("OS".to_string(), os.as_str().into()));
    }
    if let Some(banner) = &host.banner {
        details.push(("Banner".to_string(), banner.as_str().dimmed()));
    }

    print::as_tree_one_level(details);
}

fn confidence_detail(confidence: Confidence) -> ColoredString {
    match confidence {
        Confidence::Confirmed => "confirmed".green().bold(),
        Confidence::Possible => "possible".yellow(),
        Confidence::Unlikely => "unlikely".red(),
        Confidence::Unknown => "unknown".dimmed(),
    }
}

fn print_summary(report: &DiscoveryReport) {
    let candidates: ColoredString = format!("{} candidates", report.hosts.len()).bold().green();
    let scan_time: ColoredString = format!("{:.2}s", report.scan_time.as_secs_f64())
        .bold()
        .yellow();

    print::fat_separator();
    success!(
        "Discovery complete: {candidates} among {} responsive hosts in {scan_time}",
        report.total_scanned
    );
}
