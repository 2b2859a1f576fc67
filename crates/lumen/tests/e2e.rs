// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests driving the `lumen` binary against a temp database.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn lumen(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lumen"))
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env("XDG_DATA_HOME", dir.join("data"))
        .env(
            "LUMEN_STORAGE_DATABASE_PATH",
            dir.join("queue.db").to_string_lossy().as_ref(),
        )
        .env("LUMEN_OUTPUT_DIRECTORY", dir.join("out").to_string_lossy().as_ref())
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run lumen binary")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "lumen failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn add(dir: &Path, prompt: &str) -> String {
    let output = lumen(dir, &["add", prompt, "--model", "m1", "--steps", "4"]);
    assert!(
        output.status.success(),
        "add failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

#[test]
fn add_then_list_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let first = add(dir.path(), "a fox");
    let second = add(dir.path(), "a heron");
    assert_ne!(first, second);

    let items = stdout_json(&lumen(dir.path(), &["list", "--json"]));
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], first.as_str());
    assert_eq!(items[0]["status"], "pending");
    assert_eq!(items[0]["request"]["prompt"], "a fox");
    assert_eq!(items[0]["request"]["steps"], 4);
    assert_eq!(items[1]["id"], second.as_str());

    let status = stdout_json(&lumen(dir.path(), &["status", "--json"]));
    assert_eq!(status["pending"], 2);
    assert_eq!(status["completed"], 0);
    assert!(status["generating"].is_null());
}

#[test]
fn add_json_prints_item() {
    let dir = tempfile::tempdir().unwrap();
    let item = stdout_json(&lumen(
        dir.path(),
        &[
            "add",
            "a fox",
            "--model",
            "m1",
            "--seed",
            "7",
            "--theme",
            "forest",
            "--value",
            "animal=fox",
            "--json",
        ],
    ));
    assert_eq!(item["status"], "pending");
    assert_eq!(item["request"]["seed"], 7);
    assert_eq!(item["request"]["theme_id"], "forest");
    assert_eq!(item["request"]["template_values"]["animal"], "fox");
}

#[test]
fn cancel_removes_pending_item() {
    let dir = tempfile::tempdir().unwrap();
    let id = add(dir.path(), "a fox");

    let output = lumen(dir.path(), &["cancel", &id]);
    assert!(output.status.success());

    let items = stdout_json(&lumen(dir.path(), &["list", "--json"]));
    assert!(items.as_array().unwrap().is_empty());

    // Second cancel has nothing to act on.
    assert!(!lumen(dir.path(), &["cancel", &id]).status.success());
}

#[test]
fn retry_and_remove_refuse_pending_items() {
    let dir = tempfile::tempdir().unwrap();
    let id = add(dir.path(), "a fox");

    let retry = lumen(dir.path(), &["retry", &id]);
    assert!(!retry.status.success());
    assert!(String::from_utf8_lossy(&retry.stderr).contains("current: pending"));

    assert!(!lumen(dir.path(), &["remove", &id]).status.success());

    let items = stdout_json(&lumen(dir.path(), &["list", "--status", "pending", "--json"]));
    assert_eq!(items.as_array().unwrap().len(), 1);
}

#[test]
fn history_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let page = stdout_json(&lumen(dir.path(), &["history", "--json"]));
    assert_eq!(page["total"], 0);
    assert!(page["records"].as_array().unwrap().is_empty());
}

#[test]
fn invalid_config_file_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "[queue]\npoll_interval_msx = 5\n").unwrap();

    let output = lumen(
        dir.path(),
        &["status", "--config", config.to_str().unwrap()],
    );
    assert!(!output.status.success());
}

#[test]
fn empty_prompt_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = lumen(dir.path(), &["add", "  ", "--model", "m1"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("prompt must not be empty"));
}
