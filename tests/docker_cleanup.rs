//! Container cleanup when an attempt is abandoned mid-evaluation.
//!
//! Runs the Docker harness against a fake `docker` executable that logs its
//! arguments and hangs on `exec`, so every attempt hits the attempt timeout.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use swe_retry::attempt::{AttemptController, ControllerConfig, CrashPolicy, RunState};
use swe_retry::eval::SolverConfig;
use swe_retry::swe::{DockerHarness, HarnessConfig, WORKSPACE_FILE};
use tempfile::TempDir;

const FAKE_DOCKER: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_DOCKER_LOG"
case "$1" in
  exec) sleep 3 ;;
esac
exit 0
"#;

fn install_fake_docker(bin_dir: &Path, log: &Path) {
    let script = bin_dir.join("docker");
    std::fs::write(&script, FAKE_DOCKER).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let path = std::env::var("PATH").unwrap_or_default();
    std::env::set_var("PATH", format!("{}:{}", bin_dir.display(), path));
    std::env::set_var("FAKE_DOCKER_LOG", log);
    std::env::remove_var("DOCKER_AGENT_DIR");
}

fn position(lines: &[String], needle: &str, nth: usize) -> Option<usize> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.starts_with(needle))
        .nth(nth)
        .map(|(i, _)| i)
}

#[tokio::test]
async fn timed_out_attempt_removes_its_container_before_the_next_starts() {
    let tmp = TempDir::new().unwrap();
    let bin_dir = tmp.path().join("bin");
    let tasks_dir = tmp.path().join("tasks");
    let agent_dir = tmp.path().join("agent");
    for dir in [&bin_dir, &tasks_dir.join("T1"), &agent_dir] {
        std::fs::create_dir_all(dir).unwrap();
    }
    std::fs::write(
        tasks_dir.join("T1").join(WORKSPACE_FILE),
        "id: T1\nrepo: owner/repo\nfail_to_pass:\n  - pytest\n",
    )
    .unwrap();
    let log = tmp.path().join("docker.log");
    install_fake_docker(&bin_dir, &log);

    let harness = DockerHarness::new(HarnessConfig {
        tasks_dir,
        agent_dir,
        ..HarnessConfig::default()
    });
    let controller = AttemptController::new(
        harness,
        ControllerConfig::new()
            .with_max_attempts(2)
            .with_attempt_timeout(Duration::from_millis(500))
            .with_crash_policy(CrashPolicy::CountAsAttempt),
    );

    let outcome = controller
        .run(&["T1".to_string()], &SolverConfig::default())
        .await
        .unwrap();
    assert_eq!(outcome.state, RunState::Exhausted);

    let lines: Vec<String> = std::fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();

    // The first removal of each container clears a stale one; the second is the cleanup.
    let a1_cleanup = position(&lines, "rm -f swe-harness-T1-a1", 1)
        .expect("first attempt's container was never removed");
    let a2_start = position(&lines, "run -d --name swe-harness-T1-a2", 0)
        .expect("second attempt never started");
    assert!(a1_cleanup < a2_start, "attempts overlapped: {lines:#?}");
    assert!(position(&lines, "rm -f swe-harness-T1-a2", 1).is_some());
}
