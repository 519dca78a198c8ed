// SPDX-License-Identifier: Apache-2.0

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated from the user's config and credentials.
fn oneapp(home: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("oneapp");
    cmd.env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("ONEAPP_STORE__BACKEND", "memory")
        .env_remove("ONEAPP_OAUTH__CLIENT_ID")
        .env_remove("ONEAPP_OAUTH__CLIENT_SECRET")
        .env_remove("ONEAPP_GITHUB__REPOSITORY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_version() {
    let mut cmd = cargo_bin_cmd!("oneapp");
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("oneapp"));
}

#[test]
fn test_help_contains_all_commands() {
    let mut cmd = cargo_bin_cmd!("oneapp");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("profile"))
        .stdout(predicate::str::contains("app"))
        .stdout(predicate::str::contains("package"))
        .stdout(predicate::str::contains("release"))
        .stdout(predicate::str::contains("repo"))
        .stdout(predicate::str::contains("completion"));
}

#[test]
fn test_auth_status_json_unauthenticated() {
    let home = TempDir::new().unwrap();
    let output = oneapp(&home)
        .args(["auth", "status", "--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .expect("auth status --output json should produce valid JSON");
    assert_eq!(json["authenticated"], false);
    assert_eq!(json["backend"], "memory");
}

#[test]
fn test_auth_status_text() {
    let home = TempDir::new().unwrap();
    oneapp(&home)
        .args(["auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not authenticated"));
}

#[test]
fn test_logout_without_session() {
    let home = TempDir::new().unwrap();
    oneapp(&home)
        .args(["auth", "logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No stored session"));
}

#[test]
fn test_login_requires_client_credentials() {
    let home = TempDir::new().unwrap();
    oneapp(&home)
        .args(["auth", "login"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ONEAPP_OAUTH__CLIENT_ID"));
}

#[test]
fn test_app_list_requires_login() {
    let home = TempDir::new().unwrap();
    oneapp(&home)
        .args(["app", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("oneapp auth login"));
}

#[test]
fn test_app_delete_needs_confirmation() {
    let home = TempDir::new().unwrap();
    oneapp(&home)
        .args(["app", "delete", "notes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn test_package_upload_missing_file() {
    let home = TempDir::new().unwrap();
    let missing = home.path().join("missing.apk");
    oneapp(&home)
        .args(["package", "upload", "notes"])
        .arg(&missing)
        .args(["--platform", "android"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_invalid_config_file() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join("config").join("oneapp");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "[store]\nbackend = \"floppy\"\n").unwrap();

    oneapp(&home)
        .env_remove("ONEAPP_STORE__BACKEND")
        .args(["auth", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn test_completion_bash() {
    let mut cmd = cargo_bin_cmd!("oneapp");
    cmd.args(["completion", "generate", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("oneapp"));
}

#[test]
fn test_completion_zsh() {
    let mut cmd = cargo_bin_cmd!("oneapp");
    cmd.args(["completion", "generate", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef oneapp"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = cargo_bin_cmd!("oneapp");
    cmd.arg("invalid-command")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_invalid_channel() {
    let mut cmd = cargo_bin_cmd!("oneapp");
    cmd.args(["app", "list", "--channel", "nightly"])
        .assert()
        .failure()
        .code(2);
}
