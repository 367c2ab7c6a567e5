//! CLI argument parsing tests for enrich

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

fn enrich() -> Command {
    Command::new(env!("CARGO_BIN_EXE_enrich"))
}

#[test]
fn test_help_flag() {
    enrich()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Research a topic"))
        .stdout(predicate::str::contains("--verbose"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn test_version_flag() {
    enrich()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_args_shows_usage() {
    enrich()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_subcommand() {
    enrich()
        .arg("gateway")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ============================================================================
// Run command
// ============================================================================

#[test]
fn test_run_help_lists_options() {
    enrich()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-t, --topic"))
        .stdout(predicate::str::contains("-s, --schema"))
        .stdout(predicate::str::contains("-n, --max-iterations"))
        .stdout(predicate::str::contains("--seed"))
        .stdout(predicate::str::contains("-d, --document"))
        .stdout(predicate::str::contains("-o, --output"));
}

#[test]
fn test_run_requires_topic_and_schema() {
    enrich()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--topic"));

    enrich()
        .args(["run", "--topic", "Acme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--schema"));
}

#[test]
fn test_run_rejects_non_numeric_iterations() {
    enrich()
        .args(["run", "-t", "Acme", "-s", "schema.json", "-n", "many"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

// ============================================================================
// Schema command
// ============================================================================

#[test]
fn test_schema_requires_file() {
    enrich()
        .arg("schema")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<FILE>"));
}

#[test]
fn test_status_help() {
    enrich()
        .args(["status", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("configuration status"));
}
