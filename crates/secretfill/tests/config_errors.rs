//! Configuration failures are reported before any AWS request is made.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn secretfill(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_secretfill"));
    cmd.current_dir(dir.path())
        .env_clear()
        .env("PATH", std::env::var_os("PATH").unwrap_or_default());
    cmd
}

#[test]
fn test_help_lists_environment_bindings() {
    let dir = TempDir::new().unwrap();
    secretfill(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("AWS_SECRET_NAME"))
        .stdout(predicate::str::contains("APPLICATION_CONFIG_OUTFILE"));
}

#[test]
fn test_missing_secret_name_fails() {
    let dir = TempDir::new().unwrap();
    secretfill(&dir)
        .env("APPLICATION_CONFIG_FILE", "in.tmpl")
        .env("APPLICATION_CONFIG_OUTFILE", "out.json")
        .env("AWS_REGION", "us-east-1")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("AWS_SECRET_NAME not set"));

    assert!(!dir.path().join("out.json").exists());
}

#[test]
fn test_missing_region_fails() {
    let dir = TempDir::new().unwrap();
    secretfill(&dir)
        .args(["--aws-secret-name", "orders-api"])
        .args(["--application-config-file", "in.tmpl"])
        .args(["--application-config-outfile", "out.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("AWS_REGION not set"));
}

#[test]
fn test_malformed_config_file_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.yaml"), "aws-region: [unclosed\n").unwrap();

    secretfill(&dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid config file"));
}

#[test]
fn test_config_file_supplies_values() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.yaml"),
        "aws-secret-name: orders-api\napplication-config-file: in.tmpl\naws-region: us-east-1\n",
    )
    .unwrap();

    // Only the output path is left unset.
    secretfill(&dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("APPLICATION_CONFIG_OUTFILE not set"))
        .stderr(predicate::str::contains("AWS_SECRET_NAME").not());
}

#[test]
fn test_zero_timeout_fails() {
    let dir = TempDir::new().unwrap();
    secretfill(&dir)
        .env("AWS_SECRET_NAME", "orders-api")
        .env("APPLICATION_CONFIG_FILE", "in.tmpl")
        .env("APPLICATION_CONFIG_OUTFILE", "out.json")
        .env("AWS_REGION", "us-east-1")
        .env("SECRET_TIMEOUT_SECS", "0")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("SECRET_TIMEOUT_SECS"));
}

#[test]
fn test_huge_timeout_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    secretfill(&dir)
        .env("AWS_SECRET_NAME", "orders-api")
        .env("APPLICATION_CONFIG_FILE", "in.tmpl")
        .env("APPLICATION_CONFIG_OUTFILE", "out.json")
        .env("AWS_REGION", "us-east-1")
        .env("SECRET_TIMEOUT_SECS", "18446744073709551615")
        .env("LOG_FORMAT", "json")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(r#""stage":"config""#))
        .stderr(predicate::str::contains("must be at most"));
}

#[test]
fn test_json_logs_name_the_stage() {
    let dir = TempDir::new().unwrap();
    secretfill(&dir)
        .env("LOG_FORMAT", "json")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(r#""stage":"config""#));
}
