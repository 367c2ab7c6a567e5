//! Command behaviour tests against an isolated HOME

mod common;

use common::{TestEnv, COMPANY_SCHEMA, JSON_SCHEMA};
use predicates::prelude::*;

#[test]
fn test_init_creates_config_and_reports_dir() {
    let env = TestEnv::new().unwrap();

    env.command()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Next steps"));

    assert!(env.config_file().exists());
    assert!(env.data_dir.join("reports").is_dir());

    let config: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(env.config_file()).unwrap()).unwrap();
    assert_eq!(config["research"]["defaults"]["max_iterations"], 6);
}

#[test]
fn test_init_twice_keeps_existing_config() {
    let env = TestEnv::new().unwrap();
    env.command().arg("init").assert().success();

    std::fs::write(
        env.config_file(),
        r#"{"research": {"defaults": {"max_iterations": 2}}}"#,
    )
    .unwrap();
    env.command().arg("init").assert().success();

    let content = std::fs::read_to_string(env.config_file()).unwrap();
    assert!(content.contains("\"max_iterations\": 2"));
}

#[test]
fn test_status_without_config() {
    let env = TestEnv::new().unwrap();
    env.command()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("[Missing]"))
        .stdout(predicate::str::contains("6 iterations"));
}

#[test]
fn test_status_reports_api_key() {
    let env = TestEnv::new().unwrap();
    std::fs::create_dir_all(&env.data_dir).unwrap();
    std::fs::write(
        env.config_file(),
        r#"{"providers": {"openrouter": {"api_key": "sk-or-test"}}}"#,
    )
    .unwrap();

    env.command()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("API key:  [Set]"));
}

#[test]
fn test_status_lists_research_tools() {
    let env = TestEnv::new().unwrap();
    env.command()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tools:"))
        .stdout(predicate::str::contains("fetch_document"))
        .stdout(predicate::str::contains("Search the web."))
        .stdout(predicate::str::contains("lookup"));
}

#[test]
fn test_schema_native_encoding() {
    let env = TestEnv::new().unwrap();
    let path = env.write_file("company.json", COMPANY_SCHEMA).unwrap();

    env.command()
        .arg("schema")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 fields, 2 required"))
        .stdout(predicate::str::contains("- founded_year (number, required)"));
}

#[test]
fn test_schema_json_schema_encoding() {
    let env = TestEnv::new().unwrap();
    let path = env.write_file("company.schema.json", JSON_SCHEMA).unwrap();

    env.command()
        .arg("schema")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("- name (string, required): Legal name"));
}

#[test]
fn test_schema_duplicate_field_is_invalid() {
    let env = TestEnv::new().unwrap();
    let path = env
        .write_file(
            "dup.json",
            r#"{"fields": [{"name": "a", "type": "string"}, {"name": "a", "type": "number"}]}"#,
        )
        .unwrap();

    env.command()
        .arg("schema")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid schema"))
        .stderr(predicate::str::contains("duplicate field name: a"));
}

#[test]
fn test_schema_missing_file() {
    let env = TestEnv::new().unwrap();
    env.command()
        .args(["schema", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read schema file"));
}

#[test]
fn test_run_without_api_key_fails_before_research() {
    let env = TestEnv::new().unwrap();
    let schema = env.write_file("company.json", COMPANY_SCHEMA).unwrap();
    let output = env.temp_dir.path().join("out.json");

    env.command()
        .args(["run", "--topic", "Acme Corp", "--schema"])
        .arg(&schema)
        .arg("--output")
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API key configured"));

    assert!(!output.exists());
}

#[test]
fn test_run_with_bad_schema_file() {
    let env = TestEnv::new().unwrap();
    let schema = env.write_file("broken.json", "{ not json").unwrap();

    env.command()
        .args(["run", "--topic", "Acme Corp", "--schema"])
        .arg(&schema)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot parse schema file"));
}
