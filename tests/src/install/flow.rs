#![cfg(test)]
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bedrock_common::config::EngineConfig;
use bedrock_common::install::{
    AutomationUnit, ClusterNode, InstallPlan, NodeRole, Phase, PlaybookPhase,
};
use bedrock_core::install::Installer;
use bedrock_core::install::runner::{AutomationRunner, RunnerEvent};
use tokio::sync::mpsc::{self, Receiver};

/// Runner double that records every invocation and emits a plausible
/// event stream per unit.
struct RecordingRunner {
    invoked: Arc<Mutex<Vec<String>>>,
    fail_on: Option<String>,
}

impl RecordingRunner {
    fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let invoked = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                invoked: Arc::clone(&invoked),
                fail_on: None,
            },
            invoked,
        )
    }

    fn failing_on(playbook: &str) -> (Self, Arc<Mutex<Vec<String>>>) {
        let (mut runner, invoked) = Self::new();
        runner.fail_on = Some(playbook.to_string());
        (runner, invoked)
    }
}

#[async_trait]
impl AutomationRunner for RecordingRunner {
    async fn run_unit(
        &self,
        unit: &AutomationUnit,
        _inventory: &Path,
        _env: &HashMap<String, String>,
    ) -> anyhow::Result<Receiver<RunnerEvent>> {
        self.invoked.lock().unwrap().push(unit.playbook.clone());

        let fail: bool = self.fail_on.as_deref() == Some(unit.playbook.as_str());
        let task: String = unit.name.clone();
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            let _ = tx.send(RunnerEvent::TaskStart { name: task }).await;
            let _ = tx
                .send(RunnerEvent::Output {
                    line: "ok: [node]".to_string(),
                })
                .await;
            if fail {
                let _ = tx
                    .send(RunnerEvent::Failed {
                        reason: "simulated runner failure".to_string(),
                    })
                    .await;
            } else {
                let _ = tx.send(RunnerEvent::Completed).await;
            }
        });
        Ok(rx)
    }
}

fn node(last_octet: u8, hostname: Option<&str>, role: NodeRole) -> ClusterNode {
    ClusterNode {
        ip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, last_octet)),
        hostname: hostname.map(str::to_string),
        role,
    }
}

fn unit(name: &str) -> AutomationUnit {
    AutomationUnit {
        name: name.to_string(),
        playbook: format!("playbooks/{name}.yaml"),
    }
}

fn plan() -> InstallPlan {
    InstallPlan {
        nodes: vec![
            node(10, Some("vega"), NodeRole::ControlPlane),
            node(11, None, NodeRole::Worker),
        ],
        phases: vec![
            PlaybookPhase {
                name: "initial_setup".to_string(),
                units: vec![unit("ssh_keys")],
            },
            PlaybookPhase {
                name: "cluster".to_string(),
                units: vec![unit("control_plane"), unit("workers")],
            },
        ],
    }
}

fn workdir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("bedrock-flow-{tag}-{}", std::process::id()))
}

#[tokio::test]
async fn units_run_in_plan_order_and_the_run_completes() {
    let (runner, invoked) = RecordingRunner::new();
    let installer = Installer::new(Arc::new(runner), EngineConfig::default());

    let dir = workdir("order");
    let handle = installer.start(plan(), &dir, None).await.unwrap();
    handle.await.unwrap();

    assert_eq!(
        *invoked.lock().unwrap(),
        vec![
            "playbooks/ssh_keys.yaml",
            "playbooks/control_plane.yaml",
            "playbooks/workers.yaml",
        ]
    );

    let status = installer.status();
    assert_eq!(status.phase, Phase::Completed);
    assert_eq!(status.progress, 100);

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn progress_steps_through_each_completed_unit() {
    let (runner, _) = RecordingRunner::new();
    let installer = Installer::new(Arc::new(runner), EngineConfig::default());
    let mut updates = installer.subscribe();

    let dir = workdir("progress");
    let handle = installer.start(plan(), &dir, None).await.unwrap();
    handle.await.unwrap();

    let mut distinct: Vec<u8> = Vec::new();
    while let Ok(status) = updates.try_recv() {
        if distinct.last() != Some(&status.progress) {
            distinct.push(status.progress);
        }
    }
    assert_eq!(distinct, vec![0, 33, 66, 100]);

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn a_failing_unit_stops_everything_after_it() {
    let (runner, invoked) = RecordingRunner::failing_on("playbooks/control_plane.yaml");
    let installer = Installer::new(Arc::new(runner), EngineConfig::default());

    let dir = workdir("abort");
    let handle = installer.start(plan(), &dir, None).await.unwrap();
    handle.await.unwrap();

    let invoked = invoked.lock().unwrap();
    assert_eq!(invoked.len(), 2);
    assert!(!invoked.contains(&"playbooks/workers.yaml".to_string()));

    let status = installer.status();
    assert_eq!(status.phase, Phase::Failed);
    assert!(
        status
            .errors
            .iter()
            .any(|e| e.contains("simulated runner failure"))
    );

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn late_subscriber_starts_from_the_final_snapshot() {
    let (runner, _) = RecordingRunner::new();
    let installer = Installer::new(Arc::new(runner), EngineConfig::default());

    let dir = workdir("late");
    let handle = installer.start(plan(), &dir, None).await.unwrap();
    handle.await.unwrap();

    let mut updates = installer.subscribe();
    let first = updates.recv().await.unwrap();
    assert_eq!(first.phase, Phase::Completed);
    assert_eq!(first.progress, 100);

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn the_generated_inventory_names_every_node() {
    let (runner, _) = RecordingRunner::new();
    let installer = Installer::new(Arc::new(runner), EngineConfig::default());

    let dir = workdir("inventory");
    let handle = installer.start(plan(), &dir, None).await.unwrap();
    handle.await.unwrap();

    let inventory: String = tokio::fs::read_to_string(dir.join("inventory.yaml"))
        .await
        .unwrap();
    assert!(inventory.contains("vega:"));
    assert!(inventory.contains("ansible_host: 192.168.1.10"));
    assert!(inventory.contains("server-192-168-1-11:"));
    assert!(inventory.contains("ansible_user: ubuntu"));

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}
