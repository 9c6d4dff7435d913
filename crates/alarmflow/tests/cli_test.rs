//! Integration tests for the `alarmflow` CLI binary.
//!
//! These tests cover argument parsing, configuration handling, the
//! operation store commands and a one-shot engine pass, all inside
//! temporary directories.
#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `alarmflow` binary with env isolation.
///
/// Clears all `ALARMFLOW_*` variables and points the platform
/// directories at `home` so tests never touch a real configuration.
fn alarmflow_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("alarmflow");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("ALARMFLOW_CONFIG")
        .env_remove("ALARMFLOW_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Write a config file whose directories all live under `root`.
fn write_config(root: &Path, extra: &str) -> PathBuf {
    let path = root.join("alarmflow.toml");
    let body = format!(
        "[store]\n\
         directory = '{store}'\n\n\
         [fax]\n\
         inbox = '{root}/inbox'\n\
         archive = '{root}/archive'\n\
         analysis = '{root}/analysis'\n\n\
         {extra}\n",
        store = root.join("operations").display(),
        root = root.display(),
    );
    fs::write(&path, body).unwrap();
    path
}

/// Put one stored operation into the file store under `root`.
fn seed_operation(root: &Path, id: u64, number: &str) {
    let dir = root.join("operations");
    fs::create_dir_all(&dir).unwrap();
    let op = serde_json::json!({
        "id": id,
        "guid": "0b7e2f4c-5d1a-4c3e-9f2b-7a6d8e9c1b2a",
        "operation_number": number,
        "timestamp": "2026-10-19T08:15:00",
        "timestamp_income": "2026-10-19T08:15:03",
        "messenger": "ILS Nord",
        "is_acknowledged": false
    });
    fs::write(dir.join(format!("{id}.json")), op.to_string()).unwrap();
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = alarmflow_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    alarmflow_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("run")
                .and(predicate::str::contains("operations"))
                .and(predicate::str::contains("config")),
        );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    alarmflow_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("alarmflow"));
}

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    alarmflow_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_invalid_subcommand() {
    let home = tempfile::tempdir().unwrap();
    let output = alarmflow_cmd(home.path()).arg("foobar").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_env() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("custom.toml");
    alarmflow_cmd(home.path())
        .env("ALARMFLOW_CONFIG", &path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("conf/alarmflow.toml");
    let path_arg = path.to_str().unwrap();

    alarmflow_cmd(home.path())
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .success();
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("[fax]"), "{written}");
    assert!(written.contains("poll_interval_ms = 2000"), "{written}");

    alarmflow_cmd(home.path())
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));

    alarmflow_cmd(home.path())
        .args(["--config", path_arg, "config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_config_check_accepts_valid_file() {
    let home = tempfile::tempdir().unwrap();
    let path = write_config(home.path(), "");
    alarmflow_cmd(home.path())
        .args(["--config", path.to_str().unwrap(), "config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"));
}

#[test]
fn test_config_check_rejects_unknown_job() {
    let home = tempfile::tempdir().unwrap();
    let path = write_config(home.path(), "[engine]\njobs = ['log', 'pager']");
    alarmflow_cmd(home.path())
        .args(["--config", path.to_str().unwrap(), "config", "check"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("pager"));
}

#[test]
fn test_config_check_rejects_bad_regex() {
    let home = tempfile::tempdir().unwrap();
    let path = write_config(
        home.path(),
        "[replace]\ninterpret_as_regex = true\n\n[[replace.rules]]\nfrom = '(unclosed'\nto = ''",
    );
    alarmflow_cmd(home.path())
        .args(["--config", path.to_str().unwrap(), "config", "check"])
        .assert()
        .code(3);
}

#[test]
fn test_env_overrides_file() {
    let home = tempfile::tempdir().unwrap();
    let path = write_config(home.path(), "");
    alarmflow_cmd(home.path())
        .env("ALARMFLOW_ENGINE__OPERATION_STORE", "memory")
        .args(["--config", path.to_str().unwrap(), "config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("store:   memory"));
}

// ── Operations ──────────────────────────────────────────────────────

#[test]
fn test_operations_list_formats() {
    let home = tempfile::tempdir().unwrap();
    let path = write_config(home.path(), "");
    seed_operation(home.path(), 1, "B-4711");
    seed_operation(home.path(), 2, "T-0815");
    let config = path.to_str().unwrap();

    alarmflow_cmd(home.path())
        .args(["--config", config, "operations", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("B-4711").and(predicate::str::contains("T-0815")));

    let output = alarmflow_cmd(home.path())
        .args(["--config", config, "-o", "json", "operations", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 2);
}

#[test]
fn test_operations_show_and_missing_id() {
    let home = tempfile::tempdir().unwrap();
    let path = write_config(home.path(), "");
    seed_operation(home.path(), 1, "B-4711");
    let config = path.to_str().unwrap();

    alarmflow_cmd(home.path())
        .args(["--config", config, "operations", "show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ILS Nord"));

    alarmflow_cmd(home.path())
        .args(["--config", config, "operations", "show", "99"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_operations_ack_hides_from_unacknowledged_list() {
    let home = tempfile::tempdir().unwrap();
    let path = write_config(home.path(), "");
    seed_operation(home.path(), 1, "B-4711");
    let config = path.to_str().unwrap();

    alarmflow_cmd(home.path())
        .args(["--config", config, "operations", "ack", "1"])
        .assert()
        .success();

    alarmflow_cmd(home.path())
        .args(["--config", config, "-o", "plain", "operations", "list", "--unacknowledged"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let stored = fs::read_to_string(home.path().join("operations/1.json")).unwrap();
    assert!(stored.contains("\"is_acknowledged\": true"), "{stored}");
}

// ── Run ─────────────────────────────────────────────────────────────

#[test]
fn test_run_once_with_empty_inbox() {
    let home = tempfile::tempdir().unwrap();
    let path = write_config(home.path(), "");
    alarmflow_cmd(home.path())
        .args(["--config", path.to_str().unwrap(), "run", "--once"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Stored 0 operation(s)"));
    assert!(home.path().join("inbox").is_dir());
}

#[test]
fn test_run_without_usable_source_exits_seven() {
    let home = tempfile::tempdir().unwrap();
    let missing = home.path().join("no-ocr");
    // Still inside the [fax] table.
    let path = write_config(home.path(), &format!("ocr_path = '{}'", missing.display()));

    alarmflow_cmd(home.path())
        .args(["--config", path.to_str().unwrap(), "run", "--once"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("could not be started"));
}
