//! CLI Argument Parsing Tests for limitsim
//!
//! These tests verify that command-line arguments are parsed correctly and that a short run
//! reports sane results.

use assert_cmd::Command;
use predicates::prelude::*;

fn limitsim() -> Command {
    Command::cargo_bin("limitsim").unwrap()
}

#[test]
fn test_help_runs() {
    limitsim().arg("--help").assert().success();
}

#[test]
fn test_version_runs() {
    limitsim().arg("--version").assert().success();
}

// ============================================================================
// Argument validation
// ============================================================================

#[test]
fn test_resize_step_parses() {
    limitsim()
        .args(["--resize", "50ms:4", "--resize", "1s:-1", "--help"])
        .assert()
        .success();
}

#[test]
fn test_resize_step_missing_capacity_rejected() {
    limitsim()
        .args(["--resize", "50ms"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("AT:N"));
}

#[test]
fn test_zero_capacity_rejected() {
    limitsim()
        .args(["--capacity", "0", "--workers", "1", "--iterations", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("capacity must be at least 1"));
}

#[test]
fn test_bad_work_duration_rejected() {
    limitsim()
        .args(["--work", "forever"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --work duration"));
}

#[test]
fn test_quiet_suppresses_errors() {
    limitsim()
        .args(["--capacity", "0", "--quiet"])
        .assert()
        .failure()
        .stderr(predicate::str::is_empty());
}

// ============================================================================
// Runs
// ============================================================================

#[test]
fn test_threads_summary() {
    limitsim()
        .args([
            "--capacity",
            "2",
            "--workers",
            "6",
            "--iterations",
            "5",
            "--work",
            "1ms",
            "--summary",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("mode: threads"))
        .stdout(predicate::str::contains("operations: 30"))
        .stdout(predicate::str::contains(
            "final limiter: capacity: 2, running: 0, blocked: 0",
        ));
}

#[test]
fn test_async_json_summary() {
    let output = limitsim()
        .args([
            "--async",
            "--capacity",
            "3",
            "--workers",
            "10",
            "--iterations",
            "4",
            "--work",
            "10ms",
            "--resize",
            "0ms:5",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["mode"], "tasks");
    assert_eq!(summary["operations"], 40);
    assert_eq!(summary["resizes_applied"], 1);
    assert_eq!(summary["limiter"]["capacity"], 5);
    assert_eq!(summary["limiter"]["running"], 0);
    assert!(summary["concurrency"]["peak"].as_i64().unwrap() <= 5);
}

#[test]
fn test_no_summary_by_default() {
    limitsim()
        .args(["--workers", "2", "--iterations", "2", "--work", "0s"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
