mod fixtures;

use fixtures::fixture_path;
use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn codesift(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_codesift"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute codesift")
}

fn bad_code() -> String {
    fixture_path("java", Some("BadCode.java"))
        .to_string_lossy()
        .to_string()
}

#[test]
fn test_cli_help() {
    let output = codesift(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("codesift"));
    assert!(stdout.contains("--path"));
    assert!(stdout.contains("--format"));
    assert!(stdout.contains("--output-file"));
    assert!(stdout.contains("--fail-on"));
    assert!(stdout.contains("--diff"));
}

#[test]
fn test_cli_missing_path() {
    let output = codesift(&[]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("required") || stderr.contains("--path"));
}

#[test]
fn test_cli_invalid_path() {
    let output = codesift(&["--path", "/nonexistent/path/that/does/not/exist"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_cli_invalid_output_format() {
    let output = codesift(&["--path", &bad_code(), "--format", "xml"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("invalid value") || stderr.contains("possible values"));
}

#[test]
fn test_cli_list_detectors() {
    let output = codesift(&["--list-detectors"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 16);
    assert!(stdout.lines().next().unwrap().starts_with("hardcoded-secret"));
    assert!(stdout.contains("mutable-global-state"));
}

#[test]
fn test_cli_json_report() {
    let output = codesift(&["--path", &bad_code()]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let findings = report["findings"].as_array().unwrap();
    assert!(!findings.is_empty());
    assert_eq!(findings[0]["severity"], "critical");
    assert_eq!(report["summary"]["units_scanned"], 1);
    assert_eq!(
        report["summary"]["total_findings"].as_u64().unwrap() as usize,
        findings.len()
    );
}

#[test]
fn test_cli_fail_on_sets_exit_code() {
    let output = codesift(&["--path", &bad_code(), "--fail-on", "critical", "-q"]);
    assert_eq!(output.status.code(), Some(2));

    let clean = fixture_path("java", Some("CleanCode.java"));
    let output = codesift(&[
        "--path",
        clean.to_str().unwrap(),
        "--fail-on",
        "critical",
        "-q",
    ]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_cli_text_report_to_file_with_detector_filter() {
    let temp_dir = TempDir::new().unwrap();
    let report_path = temp_dir.path().join("report.txt");

    let output = codesift(&[
        "--path",
        &bad_code(),
        "--format",
        "text",
        "--detector",
        "weak-hash",
        "-O",
        report_path.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let report = fs::read_to_string(&report_path).unwrap();
    assert!(report.contains("[weak-hash]"));
    assert!(!report.contains("[sql-injection]"));
    assert!(report.trim_end().ends_with("low."));
}

#[test]
fn test_cli_unknown_detector_is_rejected() {
    let output = codesift(&["--path", &bad_code(), "--detector", "tabs-vs-spaces"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("unknown detector id: tabs-vs-spaces"));
}

#[test]
fn test_cli_diff_limits_findings() {
    let temp_dir = TempDir::new().unwrap();
    let patch_path = temp_dir.path().join("change.patch");
    fs::write(
        &patch_path,
        "--- a/BadCode.java\n+++ b/BadCode.java\n@@ -20,0 +20,1 @@\n+    private static final String API_KEY = \"sk-1234567890abcdef\";\n",
    )
    .unwrap();

    let output = codesift(&[
        "--path",
        &bad_code(),
        "--diff",
        patch_path.to_str().unwrap(),
        "--format",
        "comments",
    ]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let comments = report["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["line"], 20);
    assert!(comments[0]["message"]
        .as_str()
        .unwrap()
        .starts_with("[hardcoded-secret]"));
}
