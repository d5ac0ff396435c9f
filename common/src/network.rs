//! Network-facing domain models: scan ranges and candidate hosts.

pub mod host;
pub mod range;
