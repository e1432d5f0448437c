use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

#[allow(deprecated)]
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("tasksync").unwrap();
    cmd.env_remove("TASKSYNC_ACCESS_TOKEN").env_remove("RUST_LOG");
    cmd
}

// --- Help & version ---

#[test]
fn help_flag() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("connected provider"))
        .stdout(predicate::str::contains("complete"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tasksync"));
}

#[test]
fn add_help_names_argument() {
    cmd()
        .args(["add", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME"));
}

// --- Missing required args ---

#[test]
fn subcommand_required() {
    cmd().assert().failure().code(2);
}

#[test]
fn undo_requires_name() {
    cmd()
        .args(["undo", "42"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("NAME"));
}

// --- Config validation ---

#[test]
fn unknown_source_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(&tmp)
        .args(["tasks", "--source", "jira"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown source: jira"));
}

#[test]
fn bad_api_url_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(&tmp)
        .args(["tasks", "--api-url", "localhost:54321"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("api_url must start with"));
}

// --- Config file errors ---

#[test]
fn config_file_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(&tmp)
        .args(["sources", "--config", "/nonexistent/tasksync.toml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn invalid_toml_config() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("tasksync.toml"), "source = [not toml").unwrap();
    cmd()
        .current_dir(&tmp)
        .arg("sources")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("config parse error"));
}

#[test]
fn zero_timeout_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("tasksync.toml"), "timeout_secs = 0\n").unwrap();
    cmd()
        .current_dir(&tmp)
        .arg("sources")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("timeout_secs must be > 0"));
}

// --- Offline commands ---

#[test]
fn sources_without_session_lists_native_only() {
    let tmp = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(&tmp)
        .arg("sources")
        .assert()
        .success()
        .stdout(predicate::str::contains("native"))
        .stdout(predicate::str::contains("todoist").not());
}
