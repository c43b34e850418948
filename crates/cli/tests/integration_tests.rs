//! Integration tests for acserverctl
//!
//! These cover the configuration workflows and the exit codes a supervisor
//! relies on. Running against a live server is covered by the client crate.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn acserverctl() -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("acserverctl")?;
    cmd.env_remove("ACSERVERCTL_CONFIG").env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn test_cli_help() -> TestResult {
    acserverctl()?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("UDP plugin interface"));
    Ok(())
}

#[test]
fn test_cli_version() -> TestResult {
    acserverctl()?
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("acserverctl"));
    Ok(())
}

#[test]
fn test_completion_generation() -> TestResult {
    acserverctl()?
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_acserverctl"));
    Ok(())
}

#[test]
fn test_config_init_then_show_json() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("acserver.yaml");

    acserverctl()?
        .arg("config")
        .arg("init")
        .arg(&path)
        .assert()
        .success();
    assert!(fs::read_to_string(&path)?.contains("listening_port: 11000"));

    let output = acserverctl()?
        .args(["--json", "config", "show"])
        .arg(&path)
        .output()?;
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["success"], true);
    assert_eq!(json["config"]["remote_port"], 12000);
    assert_eq!(json["config"]["capacity"], 24);
    Ok(())
}

#[test]
fn test_config_init_does_not_overwrite() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("acserver.yaml");
    fs::write(&path, "admin_password: keep-me\n")?;

    acserverctl()?
        .arg("config")
        .arg("init")
        .arg(&path)
        .assert()
        .failure()
        .code(4);
    assert_eq!(fs::read_to_string(&path)?, "admin_password: keep-me\n");
    Ok(())
}

#[test]
fn test_invalid_config_exit_code() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bad.yaml");
    fs::write(&path, "capacity: 0\n")?;

    acserverctl()?
        .arg("run")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("capacity"));

    acserverctl()?
        .args(["config", "show"])
        .arg(&path)
        .assert()
        .failure()
        .code(4);
    Ok(())
}

#[test]
fn test_missing_config_exit_code() -> TestResult {
    let dir = tempfile::tempdir()?;

    acserverctl()?
        .arg("run")
        .arg("--config")
        .arg(dir.path().join("missing.yaml"))
        .assert()
        .failure()
        .code(1);
    Ok(())
}

#[test]
fn test_json_error_output() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bad.json");
    fs::write(&path, "{\"listening_port\": 0}")?;

    let output = acserverctl()?
        .args(["--json", "config", "show"])
        .arg(&path)
        .output()?;
    assert_eq!(output.status.code(), Some(4));
    let json: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["success"], false);
    Ok(())
}
