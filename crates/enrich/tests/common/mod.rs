//! Common test utilities for enrich integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Isolated HOME so config and reports never touch the real user directory
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let data_dir = temp_dir.path().join(".enrich");
        Ok(Self { temp_dir, data_dir })
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_enrich"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env_remove("BRAVE_API_KEY");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Write a file under the temp dir and return its path
    pub fn write_file(&self, name: &str, content: &str) -> anyhow::Result<PathBuf> {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}

pub const COMPANY_SCHEMA: &str = r#"{
  "fields": [
    {"name": "name", "type": "string", "required": true},
    {"name": "founded_year", "type": "number", "required": true},
    {"name": "headquarters", "type": "string"}
  ]
}"#;

pub const JSON_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "name": {"type": "string", "description": "Legal name"},
    "public": {"type": "boolean"}
  },
  "required": ["name"]
}"#;
