//! End-to-end tests for the `tree-sitter-orca` binary.
#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn input_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn cli() -> Command {
    Command::cargo_bin("tree-sitter-orca").unwrap()
}

#[test]
fn prints_tree_for_clean_input() {
    let file = input_file("! HF def2-SVP\n%maxcore 1000\n");
    cli()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "(source_file (simple_line (arg) (arg)) (input_line (input_title (word)) (float)))",
        ))
        .stderr(predicate::str::is_empty());
}

#[test]
fn reports_syntax_errors_with_location() {
    let file = input_file("! HF\n%scf\n  maxiter 10\n");
    let path = file.path().display().to_string();
    cli()
        .arg(file.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("(MISSING \"end\")"))
        .stderr(predicate::str::contains(format!("{path}:4:1: expected 'end'")));
}

#[test]
fn quiet_suppresses_tree() {
    let file = input_file("! HF\n");
    cli()
        .arg(file.path())
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn missing_file_exits_with_two() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .arg(dir.path().join("absent.inp"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("absent.inp"));
}

#[test]
fn verbose_logs_parser_diagnostics() {
    let file = input_file("! HF\n");
    cli()
        .arg(file.path())
        .arg("-v")
        .assert()
        .success()
        .stderr(predicate::str::contains("debug: parsed 5 bytes with 0 syntax errors"));
}
