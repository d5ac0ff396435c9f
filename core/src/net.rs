//! Network probing: local-address resolution, the reachability sweep, and
//! SSH banner fingerprinting.

pub mod fingerprint;
pub mod local;
pub mod sweep;
