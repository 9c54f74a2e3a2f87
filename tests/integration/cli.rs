//! End-to-end tests of the binary

use crate::support::channel;
use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

fn write_export(dir: &Path, count: u64) -> std::path::PathBuf {
    let path = dir.join("export.json");
    let json = serde_json::json!({ "messages": channel(count) });
    std::fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();
    path
}

fn cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("chat-history-scanner").unwrap();
    cmd.arg("--checkpoint-dir").arg(dir.join("scans"));
    cmd
}

#[test]
fn test_scan_then_status_json() {
    let dir = TempDir::new().unwrap();
    let export = write_export(dir.path(), 40);

    let output = cmd(dir.path())
        .args(["--output-format", "json", "scan", "--stream", "g", "--channel", "c", "--fast"])
        .arg("--input")
        .arg(&export)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["status"], "completed");
    let report = outcome["report_path"].as_str().unwrap();
    assert!(Path::new(report).exists());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(report).unwrap()).unwrap();
    assert_eq!(report["outcome"], "completed");
    assert!(report["top_words"].as_array().is_some_and(|w| !w.is_empty()));
    assert_eq!(report["users_by_messages"][0]["rank"], 1);

    let output = cmd(dir.path())
        .args(["--output-format", "json", "status", "--stream", "g", "--channel", "c"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["found"], true);
    assert_eq!(status["completed"], true);
}

#[test]
fn test_bounded_scan_pauses() {
    let dir = TempDir::new().unwrap();
    let export = write_export(dir.path(), 300);

    let output = cmd(dir.path())
        .args([
            "--output-format",
            "json",
            "scan",
            "--stream",
            "g",
            "--channel",
            "c",
            "--fast",
            "--max-messages",
            "50",
        ])
        .arg("--input")
        .arg(&export)
        .output()
        .unwrap();
    assert!(output.status.success());
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["status"], "paused");
}

#[test]
fn test_invalid_range_fails() {
    let dir = TempDir::new().unwrap();
    let export = write_export(dir.path(), 5);

    cmd(dir.path())
        .args([
            "scan",
            "--stream",
            "g",
            "--channel",
            "c",
            "--start",
            "2024-02-01",
            "--end",
            "2024-01-01",
        ])
        .arg("--input")
        .arg(&export)
        .assert()
        .failure();

    assert!(!dir.path().join("scans").exists());
}

#[test]
fn test_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    cmd(dir.path())
        .args(["scan", "--stream", "g", "--channel", "c", "--input"])
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure();
}
