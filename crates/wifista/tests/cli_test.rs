//! Integration tests for the `wifista` CLI binary.
//!
//! Every test runs with HOME and XDG_CONFIG_HOME pointed at a temporary
//! directory so the user's real configuration is never read.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `wifista` binary with env isolation.
fn wifista_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("wifista");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("WIFISTA_INTERFACE")
        .env_remove("WIFISTA_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Write `config.toml` where the binary will look for it.
fn write_config(home: &Path, body: &str) -> PathBuf {
    let dir = if cfg!(target_os = "macos") {
        home.join("Library/Application Support/dev.wifista.wifista")
    } else {
        home.join(".config/wifista")
    };
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const LAB_SCENARIO: &str = r"
name: lab
steps:
  - ip: created
  - command:
      start-connect:
        network_id: 9
  - expect-state: l2-connecting
";

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = wifista_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = TempDir::new().unwrap();
    wifista_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("client-mode")
            .and(predicate::str::contains("simulate"))
            .and(predicate::str::contains("scenarios"))
            .and(predicate::str::contains("states")),
    );
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    wifista_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wifista"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    wifista_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let home = TempDir::new().unwrap();
    wifista_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Scenarios and states ────────────────────────────────────────────

#[test]
fn test_scenarios_plain_lists_builtin_names() {
    let home = TempDir::new().unwrap();
    let output = wifista_cmd(home.path())
        .args(["scenarios", "-o", "plain"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let names: Vec<_> = stdout.lines().collect();
    assert_eq!(
        names,
        vec![
            "round-trip",
            "superseding",
            "ap-busy",
            "dhcp-failure",
            "roam",
            "roam-timeout",
            "reprovision",
        ]
    );
}

#[test]
fn test_states_tree_marks_the_active_chain() {
    let home = TempDir::new().unwrap();
    let output = wifista_cmd(home.path())
        .args(["states", "--active", "l3-connected"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    insta::assert_snapshot!(stdout.trim_end(), @r"
    connectable +
    ├── connecting-or-connected +
    │   ├── l2-connecting
    │   └── l2-connected +
    │       ├── wait-before-l3-provisioning
    │       ├── l3-provisioning
    │       ├── l3-connected *
    │       └── roaming
    └── disconnected
    ");
}

#[test]
fn test_states_json_lists_parents() {
    let home = TempDir::new().unwrap();
    let output = wifista_cmd(home.path())
        .args(["states", "-o", "json", "--active", "roaming"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let states = value.as_array().unwrap();
    assert_eq!(states.len(), 9);
    assert_eq!(states[0]["state"], "connectable");
    assert!(states[0]["parent"].is_null());

    let roaming = states.iter().find(|s| s["state"] == "roaming").unwrap();
    assert_eq!(roaming["parent"], "l2-connected");
    assert_eq!(roaming["depth"], 3);
    assert_eq!(roaming["active"], true);
    let disconnected = states.iter().find(|s| s["state"] == "disconnected").unwrap();
    assert_eq!(disconnected["active"], false);
}

// ── Simulate ────────────────────────────────────────────────────────

#[test]
fn test_simulate_builtin_plain_prints_final_state() {
    let home = TempDir::new().unwrap();
    wifista_cmd(home.path())
        .args(["simulate", "--builtin", "round-trip", "-o", "plain"])
        .assert()
        .success()
        .stdout("disconnected\n");
}

#[test]
fn test_simulate_builtin_table() {
    let home = TempDir::new().unwrap();
    wifista_cmd(home.path())
        .args(["simulate", "--builtin", "roam", "--calls"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Scenario: roam")
                .and(predicate::str::contains("roaming"))
                .and(predicate::str::contains("agent-register"))
                .and(predicate::str::contains("Final state: l3-connected")),
        );
}

#[test]
fn test_simulate_json_trace() {
    let home = TempDir::new().unwrap();
    let output = wifista_cmd(home.path())
        .args(["simulate", "--builtin", "ap-busy", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let trace: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(trace["scenario"], "ap-busy");
    assert!(!trace["calls"].as_array().unwrap().is_empty());
}

#[test]
fn test_simulate_unknown_builtin() {
    let home = TempDir::new().unwrap();
    let output = wifista_cmd(home.path())
        .args(["simulate", "--builtin", "nope"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("not found"));
}

#[test]
fn test_simulate_requires_a_source() {
    let home = TempDir::new().unwrap();
    let output = wifista_cmd(home.path()).arg("simulate").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_simulate_policy_flag_overrides_the_scenario() {
    let home = TempDir::new().unwrap();
    let output = wifista_cmd(home.path())
        .args(["simulate", "--builtin", "reprovision", "--policy", "disconnect"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(9));
    let text = combined_output(&output);
    assert!(text.contains("WaitBeforeL3Provisioning"), "{text}");
    assert!(text.contains("Disconnected"), "{text}");
}

#[test]
fn test_simulate_file_from_stdin() {
    let home = TempDir::new().unwrap();
    wifista_cmd(home.path())
        .args(["simulate", "-", "-o", "plain"])
        .write_stdin(
            "name: idle\nsteps:\n  - ip: created\n  - expect-state: disconnected\n",
        )
        .assert()
        .success()
        .stdout("disconnected\n");
}

#[test]
fn test_simulate_invalid_yaml_is_a_usage_error() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("broken.yaml");
    std::fs::write(&path, "name: broken\nsteps: 12\n").unwrap();
    let output = wifista_cmd(home.path())
        .arg("simulate")
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Invalid scenario"));
}

#[test]
fn test_simulate_uses_saved_networks() {
    let home = TempDir::new().unwrap();
    write_config(
        home.path(),
        r#"
[networks.lab]
id = 9
ssid = "lab"
"#,
    );
    let scenario = home.path().join("lab.yaml");
    std::fs::write(&scenario, LAB_SCENARIO).unwrap();

    wifista_cmd(home.path())
        .arg("simulate")
        .arg(&scenario)
        .args(["-o", "plain"])
        .assert()
        .success()
        .stdout("l2-connecting\n");

    let output = wifista_cmd(home.path())
        .arg("simulate")
        .arg(&scenario)
        .arg("--no-saved")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(9));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_no_config() {
    let home = TempDir::new().unwrap();
    wifista_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[defaults]"));
}

#[test]
fn test_config_show_redacts_passphrases() {
    let home = TempDir::new().unwrap();
    write_config(
        home.path(),
        r#"
[networks.home]
id = 5
ssid = "home"
security = "psk"
passphrase = "correct-horse"
"#,
    );
    for format in ["table", "json", "yaml"] {
        let output = wifista_cmd(home.path())
            .args(["config", "show", "-o", format])
            .output()
            .unwrap();
        assert!(output.status.success());
        let text = combined_output(&output);
        assert!(!text.contains("correct-horse"), "{format}: {text}");
        assert!(text.contains("****"), "{format}: {text}");
    }
}

#[test]
fn test_config_path_points_into_config_dir() {
    let home = TempDir::new().unwrap();
    wifista_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_validate_reports_bad_values() {
    let home = TempDir::new().unwrap();
    write_config(
        home.path(),
        r#"
[defaults]
reachability_policy = "sometimes"
"#,
    );
    let output = wifista_cmd(home.path())
        .args(["config", "validate"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("reachability_policy"));
}

#[test]
fn test_config_validate_lists_networks() {
    let home = TempDir::new().unwrap();
    write_config(
        home.path(),
        r#"
[networks.cafe]
id = 6
ssid = "Cafe Guest"

[networks.office]
id = 7
ssid = "office"
security = "eap"
"#,
    );
    let output = wifista_cmd(home.path())
        .args(["config", "validate", "-o", "plain"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "cafe\noffice\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 of 2 saved networks usable"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_output_format() {
    let home = TempDir::new().unwrap();
    let output = wifista_cmd(home.path())
        .args(["--output", "invalid", "scenarios"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about invalid output format:\n{text}"
    );
}

#[test]
fn test_invalid_subcommand() {
    let home = TempDir::new().unwrap();
    let output = wifista_cmd(home.path()).arg("foobar").output().unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("foobar"));
}
