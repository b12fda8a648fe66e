//! Integration tests for argument parsing, configuration, and failure reporting

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const FLEET: &[&str] = &[
    "--vnet",
    "csvnet03",
    "--zone",
    "cszone",
    "--resource_pool",
    "CS03",
    "--starting_id",
    "310",
    "--templates",
    "950",
    "951",
];

/// The binary with a clean environment and a config path inside `dir`.
fn labfleet(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("labfleet"));
    cmd.env("NO_COLOR", "1")
        .env_remove("LABFLEET_HOST")
        .env_remove("LABFLEET_USER")
        .env_remove("LABFLEET_PASSWORD")
        .env_remove("RUST_LOG")
        .env("LABFLEET_CONFIG", dir.path().join("config.yaml"));
    cmd
}

fn tempdir() -> TempDir {
    TempDir::new().expect("tempdir")
}

// --- Help and version ---

#[test]
fn test_help_lists_fleet_flags() {
    let dir = tempdir();
    labfleet(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--starting_id"))
        .stdout(predicate::str::contains("--undo"))
        .stdout(predicate::str::contains("--remove_zone"));
}

#[test]
fn test_version_flag_shows_name() {
    let dir = tempdir();
    labfleet(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("labfleet"));
}

// --- Argument validation (exit code 2) ---

#[test]
fn test_missing_required_flags_exit_with_usage_error() {
    let dir = tempdir();
    labfleet(&dir)
        .args(["--vnet", "csvnet03"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--zone"));
}

#[test]
fn test_power_on_with_undo_is_rejected() {
    let dir = tempdir();
    labfleet(&dir)
        .args(FLEET)
        .args(["--undo", "--power_on"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_remove_zone_without_undo_is_rejected() {
    let dir = tempdir();
    labfleet(&dir)
        .args(FLEET)
        .arg("--remove_zone")
        .assert()
        .code(2);
}

#[test]
fn test_invalid_zone_name_is_rejected() {
    let dir = tempdir();
    labfleet(&dir)
        .args([
            "--vnet",
            "csvnet03",
            "--zone",
            "Bad_Zone",
            "--resource_pool",
            "CS03",
            "--starting_id",
            "310",
            "--templates",
            "950",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid zone"));
}

#[test]
fn test_starting_id_below_guest_range_is_rejected() {
    let dir = tempdir();
    let mut args = FLEET.to_vec();
    args[7] = "99";
    labfleet(&dir).args(args).assert().code(2);
}

// --- Runtime failures (exit code 1) ---

#[test]
fn test_missing_host_fails_before_any_request() {
    let dir = tempdir();
    labfleet(&dir)
        .args(FLEET)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no Proxmox host given"));
}

#[test]
fn test_missing_password_without_terminal_fails() {
    let dir = tempdir();
    labfleet(&dir)
        .args(FLEET)
        .args(["--host", "http://127.0.0.1:1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no password given"));
}

#[test]
fn test_unreachable_host_is_an_authentication_failure() {
    let dir = tempdir();
    labfleet(&dir)
        .args(FLEET)
        .args(["--host", "http://127.0.0.1:1", "--password", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("authentication failed"));
}

#[test]
fn test_json_mode_prints_error_object() {
    let dir = tempdir();
    let output = labfleet(&dir)
        .args(FLEET)
        .args(["--host", "http://127.0.0.1:1", "--password", "x", "--json"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value =
        serde_json::from_slice(&output).expect("stdout should be a JSON document");
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "authentication");
}

#[test]
fn test_unparseable_config_file_is_reported() {
    let dir = tempdir();
    std::fs::write(dir.path().join("config.yaml"), "connection: [not, a, map").expect("write");
    labfleet(&dir)
        .args(FLEET)
        .args(["--host", "http://127.0.0.1:1", "--password", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot parse"));
}

#[test]
fn test_host_can_come_from_config_file() {
    let dir = tempdir();
    std::fs::write(
        dir.path().join("config.yaml"),
        "connection:\n  host: http://127.0.0.1:1\n",
    )
    .expect("write");
    labfleet(&dir)
        .args(FLEET)
        .args(["--password", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("authentication failed"))
        .stderr(predicate::str::contains("no Proxmox host given").not());
}
