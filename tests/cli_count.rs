use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

const EXAMPLE: &str = r#"{
  "tags": {"person": 1, "bus": 2},
  "frames": {
    "123": [
      {"confidence": 0.9, "tag": {"name": "person", "id": 1}},
      {"confidence": 0.3, "tag": {"name": "bus", "id": 2}}
    ],
    "400": [{"confidence": 0.6, "tag": {"name": "bus", "id": 2}}]
  },
  "dataType": "video"
}"#;

/// Command with no user config and no color.
fn framecount(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("framecount").unwrap();
    cmd.env("FRAMECOUNT_CONFIG", dir.path().join("missing.toml"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn write_input(dir: &TempDir, content: &str) -> String {
    let path = dir.path().join("analysis.json");
    fs::write(&path, content).unwrap();
    path.display().to_string()
}

#[test]
fn test_count_human_output() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, EXAMPLE);
    framecount(&dir)
        .args(["count", &input])
        .assert()
        .success()
        .stdout("Frame 123:\n  bus    = 0\n  person = 1\nFrame 400:\n  bus    = 1\n  person = 0\n");
}

#[test]
fn test_count_json_output() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, EXAMPLE);
    let output = framecount(&dir)
        .args(["count", "--json", &input])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        value,
        json!([
            {"frameKey": "123", "itemCounts": {"person": 1, "bus": 0}},
            {"frameKey": "400", "itemCounts": {"person": 0, "bus": 1}}
        ])
    );
}

#[test]
fn test_count_raw_output() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, EXAMPLE);
    framecount(&dir)
        .args(["count", "--raw", &input])
        .assert()
        .success()
        .stdout("123 bus=0 person=1\n400 bus=1 person=0\n");
}

#[test]
fn test_threshold_flag_overrides_default() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, EXAMPLE);
    framecount(&dir)
        .args(["count", "--raw", "--threshold", "0.2", &input])
        .assert()
        .success()
        .stdout("123 bus=1 person=1\n400 bus=1 person=0\n");
}

#[test]
fn test_document_threshold_used_without_flag() {
    let dir = TempDir::new().unwrap();
    let doc = EXAMPLE.replace(
        "\"dataType\": \"video\"",
        "\"dataType\": \"video\", \"confidenceThreshold\": 0.95",
    );
    let input = write_input(&dir, &doc);
    framecount(&dir)
        .args(["count", "--raw", &input])
        .assert()
        .success()
        .stdout("123 bus=0 person=0\n400 bus=0 person=0\n");

    framecount(&dir)
        .args(["count", "--raw", "-t", "0.5", &input])
        .assert()
        .success()
        .stdout("123 bus=0 person=1\n400 bus=1 person=0\n");
}

#[test]
fn test_unknown_tag_rejected_by_default() {
    let dir = TempDir::new().unwrap();
    let input = write_input(
        &dir,
        r#"{"tags": {"person": 1}, "frames": {"5": [{"confidence": 0.9, "tag": {"name": "car"}}]}}"#,
    );
    framecount(&dir)
        .args(["count", &input])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "Error: frame 5: detection tagged \"car\" which is not a known tag",
        ));
}

#[test]
fn test_unknown_tag_policies() {
    let dir = TempDir::new().unwrap();
    let input = write_input(
        &dir,
        r#"{"tags": {"person": 1}, "frames": {"5": [{"confidence": 0.9, "tag": {"name": "car"}}]}}"#,
    );
    framecount(&dir)
        .args(["count", "--raw", "--unknown-tags", "ignore", &input])
        .assert()
        .success()
        .stdout("5 person=0\n");

    framecount(&dir)
        .args(["count", "--raw", "--unknown-tags", "extend", &input])
        .assert()
        .success()
        .stdout("5 car=1 person=0\n");

    framecount(&dir)
        .args(["count", "--unknown-tags", "strict", &input])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unknown tag policy: strict"));
}

#[test]
fn test_summary_output() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, EXAMPLE);
    framecount(&dir)
        .args(["count", "--summary", &input])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Summary:\n  frames = 2\n  total = 2\n  bus = 1 (peak 1 in frame 400)\n  person = 1 (peak 1 in frame 123)",
        ));

    let output = framecount(&dir)
        .args(["count", "--summary", "--json", &input])
        .output()
        .unwrap();
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["summary"]["frameCount"], json!(2));
    assert_eq!(value["summary"]["totals"], json!({"bus": 1, "person": 1}));
    assert_eq!(
        value["summary"]["peaks"]["bus"],
        json!({"frameKey": "400", "count": 1})
    );
    assert_eq!(value["counts"].as_array().unwrap().len(), 2);
}

#[test]
fn test_count_reads_stdin() {
    let dir = TempDir::new().unwrap();
    framecount(&dir)
        .args(["count", "--raw", "-"])
        .write_stdin(EXAMPLE)
        .assert()
        .success()
        .stdout("123 bus=0 person=1\n400 bus=1 person=0\n");
}

#[test]
fn test_empty_frames_print_nothing() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, r#"{"tags": {"person": 1}, "frames": {}}"#);
    framecount(&dir)
        .args(["count", &input])
        .assert()
        .success()
        .stdout("");

    framecount(&dir)
        .args(["count", "--json", &input])
        .assert()
        .success()
        .stdout("[]\n");
}

#[test]
fn test_invalid_document_exit_code() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, r#"{"tags": {"person": 1}, "frames": {"first": []}}"#);
    framecount(&dir)
        .args(["count", &input])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Error: invalid analysis document"));
}

#[test]
fn test_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.json").display().to_string();
    framecount(&dir)
        .args(["count", &missing])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("failed to read"))
        .stderr(predicate::str::contains("nope.json"));
}

#[test]
fn test_json_conflicts_with_raw() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, EXAMPLE);
    framecount(&dir)
        .args(["count", "--json", "--raw", &input])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_tag_pattern_from_config() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, EXAMPLE.replace("\"person\": 1", "\"Person\": 1").as_str());
    let config = dir.path().join("config.toml");
    fs::write(&config, "[validation]\ntag_pattern = \"^[a-z]+$\"\n").unwrap();

    framecount(&dir)
        .env("FRAMECOUNT_CONFIG", &config)
        .args(["count", &input])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains(
            "tag name \"Person\" does not match pattern ^[a-z]+$",
        ));
}

#[test]
fn test_verbose_logs_to_stderr() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, EXAMPLE);
    framecount(&dir)
        .args(["-v", "count", "--raw", &input])
        .assert()
        .success()
        .stdout("123 bus=0 person=1\n400 bus=1 person=0\n")
        .stderr(predicate::str::contains("counting detections"));
}
