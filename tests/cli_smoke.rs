use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::process::Command;

const ENV_VARS: [&str; 4] = [
    "SIGNALTAP_ENDPOINT",
    "SIGNALTAP_SOURCE_ID",
    "SIGNALTAP_PROFILE_ID",
    "SIGNALTAP_SESSION_ID",
];

fn signaltap(config: &std::path::Path) -> Command {
    let bin = assert_cmd::cargo::cargo_bin!("signaltap");
    let mut cmd = Command::new(bin);
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "warn")
        .args(["--config", config.to_str().unwrap()]);
    cmd
}

#[test]
fn dry_run_replay_prints_captured_batches() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    fs::write(&config, "dispatch:\n  debounce_ms: 500\n").unwrap();

    let assert = signaltap(&config)
        .args([
            "--output",
            "json",
            "replay",
            "tests/fixtures/evening_edition.yaml",
            "--dry-run",
            "--speed",
            "10",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let value: Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(value["dry_run"], Value::Bool(true));
    assert_eq!(value["skipped_events"].as_u64(), Some(0));
    assert_eq!(value["report"]["tracked_elements"].as_u64(), Some(6));

    let deliveries = value["deliveries"].as_array().expect("deliveries");
    assert!(!deliveries.is_empty());
    let last = deliveries.last().unwrap();
    assert_eq!(last["mode"].as_str(), Some("beacon"));
    assert_eq!(last["batch"]["profile"]["id"].as_str(), Some("dry-run-profile"));
    let contents: Vec<&str> = deliveries
        .iter()
        .flat_map(|delivery| delivery["batch"]["elements"].as_array().unwrap())
        .filter_map(|element| element["content"].as_str())
        .collect();
    assert!(contents.contains(&"Bridge reopens after repairs"));
}

#[test]
fn config_show_includes_environment_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    fs::write(&config, "interaction:\n  hover_min_ms: 250\n").unwrap();

    let assert = signaltap(&config)
        .env("SIGNALTAP_SOURCE_ID", "smoke-source")
        .args(["--output", "json", "config", "show"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let value: Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(value["interaction"]["hover_min_ms"].as_u64(), Some(250));
    assert_eq!(value["dispatch"]["source_id"].as_str(), Some("smoke-source"));
    assert_eq!(value["dispatch"]["debounce_ms"].as_u64(), Some(1000));
}

#[test]
fn invalid_configuration_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    fs::write(&config, "visibility:\n  threshold: 1.5\n").unwrap();

    signaltap(&config)
        .args(["config", "validate"])
        .assert()
        .failure();
}

#[test]
fn missing_trace_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("absent.yaml");

    signaltap(&config)
        .args(["replay", "tests/fixtures/does-not-exist.yaml", "--dry-run"])
        .assert()
        .failure();
}
