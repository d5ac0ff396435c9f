//! # Candidate host model
//!
//! The record discovery produces for every responsive address, together
//! with the confidence scale used to rank results.

use std::net::IpAddr;

use serde::Serialize;

/// How strongly the fingerprinter believes a host runs the target OS.
///
/// The derived ordering is the ranking order: `Confirmed` sorts before
/// `Possible`, which sorts before the tiers discovery filters out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Confirmed,
    Possible,
    Unlikely,
    Unknown,
}

impl Confidence {
    /// Whether discovery keeps a host at this tier in its result set.
    pub fn is_candidate(self) -> bool {
        matches!(self, Confidence::Confirmed | Confidence::Possible)
    }
}

/// One responsive host, as assembled by the discovery coordinator.
///
/// Immutable once produced; discovery hands the full set to the caller and
/// keeps nothing.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateHost {
    pub ip: IpAddr,
    pub hostname: Option<String>,
    pub banner: Option<String>,
    pub ssh_available: bool,
    pub confidence: Confidence,
    pub os_guess: Option<String>,
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
