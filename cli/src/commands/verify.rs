use std::net::IpAddr;

use anyhow::bail;
use colored::*;

use bedrock_common::config::EngineConfig;
use bedrock_common::success;
use bedrock_core::verify::{self, ConnectivityReport};

use crate::terminal::print;

type Detail = (String, ColoredString);

pub async fn verify(
    address: IpAddr,
    user: &str,
    password: Option<&str>,
    cfg: &EngineConfig,
) -> anyhow::Result<()> {
    let report: ConnectivityReport =
        verify::verify_connectivity(address, user, password, cfg).await;

    if !report.connected {
        bail!("{}", report.message);
    }

    success!("{}", report.message);

    let mut details: Vec<Detail> = vec![("IPv4".to_string(), address.to_string().cyan())];
    if let Some(hostname) = &report.hostname {
        details.push(("Host".to_string(), hostname.as_str().green()));
    }
    if let Some(os_info) = &report.os_info {
        details.push(("OS".to_string(), os_info.as_str().into()));
    }
    print::as_tree_one_level(details);

    Ok(())
}
