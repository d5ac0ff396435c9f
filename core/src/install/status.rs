//! # Progress broadcasting
//!
//! One [`InstallationStatus`] exists per process, owned by the hub. Every
//! mutation happens inside a single critical section together with the
//! broadcast of the resulting snapshot, so no second mutation can slip in
//! between a change and its delivery. Delivery is best-effort: a subscriber
//! that fails to accept a single push is dropped on the spot, with no retry
//! and no backpressure on the orchestrator.

use std::sync::{Arc, Mutex, PoisonError};

use bedrock_common::install::{InstallationStatus, Phase};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Clone)]
pub struct StatusHub {
    inner: Arc<Mutex<HubInner>>,
}

struct HubInner {
    status: InstallationStatus,
    subscribers: Vec<UnboundedSender<InstallationStatus>>,
}

impl StatusHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                status: InstallationStatus::new(),
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point-in-time copy of the status.
    pub fn snapshot(&self) -> InstallationStatus {
        self.lock().status.clone()
    }

    /// Registers an observer. The current snapshot is delivered before any
    /// subsequent push, so latecomers are never without state.
    pub fn subscribe(&self) -> UnboundedReceiver<InstallationStatus> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let snapshot = inner.status.clone();
        if tx.send(snapshot).is_ok() {
            inner.subscribers.push(tx);
        }
        rx
    }

    /// Applies a mutation and broadcasts the result as one atomic step.
    pub fn update(&self, mutate: impl FnOnce(&mut InstallationStatus)) {
        let mut inner = self.lock();
        mutate(&mut inner.status);
        let snapshot = inner.status.clone();
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
    }

    /// Overwrites the status with a fresh one. The only way out of a
    /// terminal phase.
    pub fn reset(&self) {
        self.update(|status| *status = InstallationStatus::new());
    }

    /// Transitions `Idle → Starting` atomically. Returns `false` when a run
    /// is in progress or a finished run has not been reset.
    pub(crate) fn try_begin(&self) -> bool {
        let mut inner = self.lock();
        if inner.status.phase != Phase::Idle {
            return false;
        }
        inner.status.phase = Phase::Starting;
        inner.status.current_task = "Preparing installation".to_string();
        let snapshot = inner.status.clone();
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
        true
    }
}

impl Default for StatusHub {
    fn default() -> Self {
        Self::new()
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
