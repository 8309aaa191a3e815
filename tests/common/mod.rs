//! Shared helpers for the integration and stress suites.

#![allow(dead_code)]

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use stackgraph::test_utils::TemplateFixture;

/// Output of one CLI invocation.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

/// Temporary workspace holding template files and an isolated configuration file.
pub struct TestProject {
    _temp_dir: TempDir,
    pub dir: PathBuf,
    pub config_path: PathBuf,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let dir = temp_dir.path().to_path_buf();
        let config_path = dir.join("config.toml");
        std::fs::write(&config_path, "")?;
        Ok(Self {
            _temp_dir: temp_dir,
            dir,
            config_path,
        })
    }

    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn write_fixture(&self, fixture: &TemplateFixture) -> Result<PathBuf> {
        fixture.write_to(&self.dir)
    }

    pub fn write_config(&self, content: &str) -> Result<()> {
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Run the stackgraph binary in the project directory with the project config.
    pub fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = Command::new(env!("CARGO_BIN_EXE_stackgraph"))
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .current_dir(&self.dir)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .output()
            .context("Failed to run stackgraph command")?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

/// Lines of `output`, trimmed, without blanks.
pub fn lines(output: &str) -> Vec<&str> {
    output.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

pub fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}
