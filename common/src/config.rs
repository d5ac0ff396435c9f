use std::time::Duration;

/// Engine-wide tuning knobs.
///
/// A single instance is built by the caller (CLI or embedding service) and
/// passed by reference into the engine entry points. Every network operation
/// the engine performs derives its timeout from here, so no probe can block
/// the control thread beyond its configured bound.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-address reachability probe timeout for the sweep.
    pub ping_timeout: Duration,
    /// How many reachability probes run concurrently in one batch.
    pub ping_batch_size: usize,
    /// Port the SSH fingerprinter connects to.
    pub ssh_port: u16,
    /// Connect-and-read deadline for the SSH banner grab.
    pub banner_timeout: Duration,
    /// Deadline for a single introspection command (local or remote).
    pub command_timeout: Duration,
    /// Remote user for SSH sessions (hostname lookup, hardware probing).
    pub ssh_user: String,
    /// Idle-output window for an external automation unit. If the runner
    /// process produces no output line within this window it is killed and
    /// the run is marked failed.
    pub runner_idle_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ping_timeout: Duration::from_secs(1),
            ping_batch_size: 50,
            ssh_port: 22,
            banner_timeout: Duration::from_secs(3),
            command_timeout: Duration::from_secs(10),
            ssh_user: "ubuntu".to_string(),
            runner_idle_timeout: Duration::from_secs(300),
        }
    }
}
