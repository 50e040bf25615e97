//! Integration tests for the forum CLI

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("mods")).unwrap();
        Workspace { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn config_path(&self) -> PathBuf {
        self.root().join("forum.toml")
    }

    fn write_config(&self, content: &str) {
        fs::write(self.config_path(), content).unwrap();
    }

    fn add_unit(&self, name: &str, content: &str) {
        fs::write(self.root().join("mods").join(format!("{}.toml", name)), content).unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("forum");
        cmd.env("FORUM_CONFIG", self.config_path())
            .env("HOME", self.root())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .arg("--root")
            .arg(self.root());
        cmd
    }
}

#[test]
fn test_version() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("forum"));
}

#[test]
fn test_help() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Forum mod system"));
    ws.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("entity schema they compose"))
        .stdout(predicate::str::contains("schema"));
}

#[test]
fn test_invalid_command() {
    let ws = Workspace::new();
    ws.cmd().arg("invalid").assert().failure();
}

#[test]
fn test_config_show_defaults() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration:"))
        .stdout(predicate::str::contains("mods.installed: ..."));
}

#[test]
fn test_config_path_honors_env() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("forum.toml"));
}

#[test]
fn test_config_set_then_get() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "set", "mods.disabled", "icons, polls"])
        .assert()
        .success();
    ws.cmd()
        .args(["config", "get", "mods.disabled"])
        .assert()
        .success()
        .stdout(predicate::str::contains("icons,polls"));

    let saved = fs::read_to_string(ws.config_path()).unwrap();
    assert!(saved.contains("disabled"));
}

#[test]
fn test_config_set_rejects_unknown_key() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "set", "mods.colour", "red"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mods.colour"));
}

#[test]
fn test_mods_list_empty_directory() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["mods", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("There are no mods"));
}

#[test]
fn test_mods_list_shows_load_order() {
    let ws = Workspace::new();
    ws.write_config("[mods]\ninstalled = [\"last_post\", \"...\"]\ndisabled = [\"icons\"]\n");
    ws.add_unit("approve_topic", "");
    ws.add_unit("icons", "");
    ws.add_unit("last_post", "version = \"1.2\"\n");
    ws.add_unit("mod", "");

    ws.cmd()
        .args(["mods", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. last_post"))
        .stdout(predicate::str::contains("v1.2"))
        .stdout(predicate::str::contains("2. approve_topic"))
        .stdout(predicate::str::contains("icons (disabled)"));
}

#[test]
fn test_mods_check_reports_installed() {
    let ws = Workspace::new();
    ws.add_unit("approve_topic", "");
    ws.add_unit("last_post", "");

    ws.cmd()
        .args(["mods", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("approve_topic"))
        .stdout(predicate::str::contains("last_post"))
        .stderr(predicate::str::contains("Installed 2 mods"));
}

#[test]
fn test_mods_check_fails_on_missing_requirement() {
    let ws = Workspace::new();
    ws.write_config("[mods]\nfail_on_missing_required = true\n");
    ws.add_unit("private_message", "");

    ws.cmd()
        .args(["mods", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("private_message"))
        .stderr(predicate::str::contains("icons"))
        .stderr(predicate::str::contains("Mod installation failed"))
        .stderr(predicate::str::contains("Log file:"));

    let log = fs::read_to_string(ws.root().join(".config/forum/forum.log")).unwrap();
    assert!(log.contains("PHASE Installing mods from"), "{log}");
    assert!(log.contains("ERROR Mod installation failed"), "{log}");
}

#[test]
fn test_mods_check_uninstalls_dependent_by_default() {
    let ws = Workspace::new();
    ws.add_unit("private_message", "");

    ws.cmd()
        .args(["mods", "check"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Uninstalled private_message"));
}

#[test]
fn test_schema_lists_objects() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("Topic"))
        .stdout(predicate::str::contains("forum_topics"))
        .stdout(predicate::str::contains("TopicStatus"));
}

#[test]
fn test_schema_entity_json() {
    let ws = Workspace::new();
    ws.add_unit("approve_topic", "");

    let output = ws
        .cmd()
        .args(["schema", "Topic", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let schema: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(schema["name"], "Topic");
    assert_eq!(schema["table"], "forum_topics");
    assert_eq!(schema["bases"], serde_json::json!(["ApproveTopicModTopic"]));
    let approved = schema["attrs"]
        .as_array()
        .unwrap()
        .iter()
        .find(|attr| attr["name"] == "approved")
        .unwrap();
    assert_eq!(approved["column"], "topic_approved");
    assert_eq!(approved["owner"], "ApproveTopicModTopic");
}

#[test]
fn test_schema_unknown_entity() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["schema", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nope"));
}
