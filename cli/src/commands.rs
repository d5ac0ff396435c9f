pub mod discover;
pub mod hardware;
pub mod install;
pub mod verify;

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bedrock")]
#[command(about = "A bare-metal cluster bootstrap engine.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover installation candidates in a network range
    #[command(alias = "d")]
    Discover {
        /// Range to sweep, e.g. 192.168.1.0/24
        cidr: String,
    },
    /// Verify a server is reachable and report its OS
    #[command(alias = "v")]
    Verify {
        address: IpAddr,
        #[arg(long, default_value = "ubuntu")]
        user: String,
        /// SSH password; key-based auth is used when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Inspect CPU, memory, disk and GPU passthrough readiness
    #[command(alias = "hw")]
    Hardware {
        address: IpAddr,
        #[arg(long, default_value = "ubuntu")]
        user: String,
    },
    /// Run an installation plan against the cluster
    #[command(alias = "i")]
    Install {
        /// Path to a JSON installation plan
        plan: PathBuf,
        /// Directory the generated inventory is written to
        #[arg(long, default_value = ".bedrock")]
        workdir: PathBuf,
        /// Privilege escalation password, handed to the runner via its
        /// environment and never written to disk
        #[arg(long)]
        become_password: Option<String>,
    },
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
