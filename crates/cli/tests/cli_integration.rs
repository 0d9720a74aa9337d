//! CLI integration tests for `validate` and `run`.
//!
//! Uses `assert_cmd` to spawn the `nfvo` binary and verify exit codes,
//! stdout content, and stderr content. Commands run from the crate root
//! so fixture paths are relative to it.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn nfvo() -> Command {
    let mut cmd = cargo_bin_cmd!("nfvo");
    cmd.current_dir(Path::new(env!("CARGO_MANIFEST_DIR")));
    cmd
}

const PINGPONG: &str = "tests/fixtures/pingpong.json";
const FAST_CONFIG: &str = "tests/fixtures/fast.toml";

// ──────────────────────────────────────────────
// Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    nfvo()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("NFV network service orchestrator"));
}

#[test]
fn version_exits_0() {
    nfvo()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nfvo"));
}

#[test]
fn unknown_subcommand_fails() {
    nfvo().arg("deploy").assert().failure();
}

// ──────────────────────────────────────────────
// validate
// ──────────────────────────────────────────────

#[test]
fn validate_counts_descriptors() {
    nfvo()
        .args(["validate", PINGPONG])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "valid: 1 nsd, 2 vnfd, 1 ns instance config",
        ));
}

#[test]
fn validate_json_lists_ids() {
    let output = nfvo()
        .args(["--output", "json", "validate", PINGPONG])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["nsd"], serde_json::json!(["pingpong-nsd"]));
    assert_eq!(json["vnfd"], serde_json::json!(["ping", "pong"]));
    assert_eq!(json["ns_instance_config"], serde_json::json!(["pingpong-1"]));
}

#[test]
fn validate_rejects_unknown_vnfd_reference() {
    nfvo()
        .args(["validate", "tests/fixtures/unknown_vnfd.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid bundle"))
        .stderr(predicate::str::contains("unknown vnfd 'ghost'"));
}

#[test]
fn validate_json_reports_errors_on_stdout() {
    let output = nfvo()
        .args([
            "--output",
            "json",
            "validate",
            "tests/fixtures/unknown_vnfd.json",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["valid"], false);
    assert!(json["errors"][0].as_str().unwrap().contains("broken-nsd"));
}

#[test]
fn validate_missing_file_fails() {
    nfvo()
        .args(["validate", "tests/fixtures/nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: error reading file"));
}

#[test]
fn validate_rejects_non_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bundle.json");
    std::fs::write(&path, "nsd: [").unwrap();
    nfvo()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error parsing JSON"));
}

#[test]
fn validate_rejects_bundle_without_descriptors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bundle.json");
    std::fs::write(&path, r#"{"ns_instance_config": []}"#).unwrap();
    nfvo()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required field: 'nsd'"));
}

// ──────────────────────────────────────────────
// run
// ──────────────────────────────────────────────

#[test]
fn run_brings_the_ns_to_running() {
    nfvo()
        .args(["--quiet", "run", PINGPONG, "--config", FAST_CONFIG])
        .assert()
        .success()
        .stdout(predicate::str::contains("ns pingpong (pingpong-1): running"))
        .stdout(predicate::str::contains("networks 1/1 active, vms 2/2 active"))
        .stdout(predicate::str::contains("vnfr pingpong__ping__1: running"))
        .stdout(predicate::str::contains("event ns-running"));
}

#[test]
fn run_json_prints_opdata_and_vnfrs() {
    let output = nfvo()
        .args([
            "--quiet",
            "--output",
            "json",
            "run",
            PINGPONG,
            "--config",
            FAST_CONFIG,
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let nsrs = json["ns_instance_opdata"].as_array().unwrap();
    assert_eq!(nsrs.len(), 1);
    assert_eq!(nsrs[0]["operational_status"], "running");
    assert_eq!(nsrs[0]["nsd_ref"], "pingpong-nsd");
    assert_eq!(nsrs[0]["scaling_group_record"][0]["scaling_group_name_ref"], "pong-group");
    // Member 3 only exists inside pong-group instances, and min is 0.
    let vnfrs = json["vnfr_catalog"].as_array().unwrap();
    assert_eq!(vnfrs.len(), 2);
    assert!(vnfrs.iter().all(|v| v["nsr_id_ref"] == "pingpong-1"));
}

#[test]
fn run_with_failed_vdu_reports_the_failure() {
    nfvo()
        .args([
            "--quiet",
            "run",
            PINGPONG,
            "--config",
            FAST_CONFIG,
            "--fail-vdu",
            "pong-vm",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("ns pingpong (pingpong-1): failed"))
        .stdout(predicate::str::contains("simulated VDU failure"));
}

#[test]
fn run_needs_ns_instances() {
    nfvo()
        .args(["run", "tests/fixtures/descriptors.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no ns_instance_config entries"));
}

#[test]
fn run_reports_unreadable_config() {
    nfvo()
        .args(["run", PINGPONG, "--config", "tests/fixtures/missing.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn run_rejects_bad_log_level() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nfvo.toml");
    std::fs::write(&path, "[log]\nlevel = \"loud\"\n").unwrap();
    nfvo()
        .args(["run", PINGPONG, "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown log level 'loud'"));
}
