use assert_cmd::prelude::*;
use predicates::prelude::*;
use regex::Regex;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_file(path: &PathBuf, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn normalize_paths(s: &str) -> String {
    let re = Regex::new(r#"(?m)^path: .*$"#).unwrap();
    re.replace(s, "path: <CFG>").to_string()
}

const CONFIG: &str = r#"
version = 1
profile = "default"

[profiles.default]
vault_root = "/nonexistent/v"
excluded_folders = [".trash"]
ignore = ["*.tmp.md"]
"#;

#[test]
fn doctor_reads_provided_config_path() {
    let tmp = tempdir().unwrap();
    let cfg = tmp.path().join("config.toml");
    write_file(&cfg, CONFIG);

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vlk"));
    cmd.args(["doctor", "--config", cfg.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("OK   vlk doctor"))
        .stdout(predicate::str::contains("profile: default"))
        .stdout(predicate::str::contains("vault_root: /nonexistent/v"));
}

#[test]
fn doctor_uses_xdg_default_when_present() {
    let tmp = tempdir().unwrap();
    let cfg_path = tmp.path().join("vaultlink").join("config.toml");
    write_file(
        &cfg_path,
        r#"
version = 1
[profiles.default]
vault_root = "/nonexistent/v"
"#,
    );

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vlk"));
    cmd.env("XDG_CONFIG_HOME", tmp.path());
    cmd.arg("doctor");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("OK   vlk doctor"))
        .stdout(predicate::str::contains("vault_root: /nonexistent/v"));
}

#[test]
fn doctor_runs_without_config_when_vault_given() {
    let tmp = tempdir().unwrap();
    let vault = tmp.path().join("vault");
    fs::create_dir_all(&vault).unwrap();

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vlk"));
    cmd.env("XDG_CONFIG_HOME", tmp.path().join("empty"));
    cmd.args(["doctor", "--vault", vault.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("OK   vlk doctor"))
        .stdout(predicate::str::contains("path: (none)"))
        .stdout(predicate::str::contains("WARN").not());
}

#[test]
fn doctor_snapshot_default_profile() {
    let tmp = tempdir().unwrap();
    let cfg = tmp.path().join("config.toml");
    write_file(&cfg, CONFIG);

    let assert = Command::new(assert_cmd::cargo::cargo_bin!("vlk"))
        .args(["doctor", "--config", cfg.to_str().unwrap()])
        .assert()
        .success();

    let out = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    insta::assert_snapshot!(normalize_paths(&out), @r"
    OK   vlk doctor
    path: <CFG>
    profile: default
    vault_root: /nonexistent/v
    excluded_folders: [/nonexistent/v/.trash]
    ignore: [*.tmp.md]
    workers: 4
    search.enabled: true
    search.tool: rg
    search.timeout_secs: 30
    export.max_backlink_depth: 10
    logging.level: info
    WARN vault_root is not a directory
    ");
}
