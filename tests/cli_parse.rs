//! End-to-end tests for the `parse` subcommand.
//!
//! These run the compiled binary and check its output streams and exit codes.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn codegraph(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_codegraph"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run codegraph")
}

fn create_module(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp_dir.path().join("go.mod"), "module testmod\n\ngo 1.24\n").unwrap();
    for (name, content) in files {
        let path = temp_dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    temp_dir
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_parse_current_directory_succeeds() {
    let temp_dir = create_module(&[("main.go", "package main\n\nfunc main() {}\n")]);

    let output = codegraph(&["parse", "--output", "out.graphml"], temp_dir.path());

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Package: testmod\n  Name: main\n  Files (1):"));
    assert!(out.contains("Module: testmod"));
    assert!(out.contains("Loaded 1 packages, parsed 1 files"));
    assert!(!temp_dir.path().join("out.graphml").exists());
}

#[test]
fn test_parse_errors_still_exit_zero() {
    let temp_dir = create_module(&[("main.go", "package main\n\nfunc main( {\n")]);

    let output = codegraph(&["parse", "--output", "out.graphml", "."], temp_dir.path());

    assert_eq!(output.status.code(), Some(0));
    let err = stderr(&output);
    assert!(err.contains("main.go:"));
    assert!(err.contains("syntax error"));
    assert!(err.contains("Encountered "));
    assert!(err.contains(" parse errors"));
    assert!(stdout(&output).contains("  Errors: "));
}

#[test]
fn test_parse_error_total_counts_every_error() {
    let temp_dir = create_module(&[
        ("a/x.go", "package a\n\nfunc X( {\n"),
        ("a/y.go", "package a\n\nfunc Y( {\n"),
    ]);

    let output = codegraph(&["parse", "--output", "out.graphml"], temp_dir.path());

    assert_eq!(output.status.code(), Some(0));
    let err = stderr(&output);
    let diagnostics = err.lines().filter(|l| l.contains(".go:")).count();
    assert!(diagnostics >= 2);
    assert!(err.contains(&format!("Encountered {} parse errors\n", diagnostics)));
}

#[test]
fn test_include_tests_merges_test_files() {
    let temp_dir = create_module(&[
        ("calc/calc.go", "package calc\n"),
        ("calc/calc_test.go", "package calc\n"),
    ]);

    let output = codegraph(&["parse", "--output", "out.graphml", "--include-tests"], temp_dir.path());

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Package: testmod/calc\n  Name: calc\n  Files (2):"));
    assert!(!out.contains("calc.test"));
}

#[test]
fn test_json_format() {
    let temp_dir = create_module(&[("main.go", "package main\n")]);

    let output = codegraph(&["parse", "--output", "out.graphml", "--format", "json"], temp_dir.path());

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout is not JSON");
    assert_eq!(value["module"], "testmod");
    assert_eq!(value["packages"].as_array().unwrap().len(), 1);
}

#[test]
fn test_hard_errors_exit_one() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("file.txt");
    fs::write(&file, "test").unwrap();

    let cases: Vec<Vec<&str>> = vec![
        vec!["parse"],
        vec!["parse", "--output", ""],
        vec!["parse", "--output", "out.graphml", "/non/existent/path"],
        vec!["parse", "--output", "out.graphml", file.to_str().unwrap()],
        vec!["parse", "--output", "out.graphml", "--unknown-flag"],
        vec!["parse", "--output", "out.graphml", "--include-tests=invalid"],
        vec!["unknown"],
        vec![],
    ];

    for args in cases {
        let output = codegraph(&args, temp_dir.path());
        assert_eq!(output.status.code(), Some(1), "args {:?}, stderr: {}", args, stderr(&output));
    }
}

#[test]
fn test_hard_error_message_is_one_prefixed_line() {
    let temp_dir = TempDir::new().unwrap();

    let output = codegraph(&["parse", "--output", "out.graphml", "/non/existent/path"], temp_dir.path());

    let err = stderr(&output);
    assert!(err.starts_with("Error: failed to resolve '/non/existent/path': "));
    assert_eq!(err.lines().count(), 1);
    assert!(err.ends_with('\n'));
}

#[test]
fn test_help_exits_zero() {
    let temp_dir = TempDir::new().unwrap();
    let output = codegraph(&["parse", "--help"], temp_dir.path());

    assert!(output.status.success());
    assert!(stdout(&output).contains("--include-tests"));
}
