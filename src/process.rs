//! [`DeployBackend`] that shells out to the project's own tooling.

use std::path::{Path, PathBuf};
use std::process::Output;

use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::backend::DeployBackend;
use crate::config::CommandsConfig;
use crate::error::{OrchestratorError, Result};
use crate::types::EnvironmentConfig;

/// Lines of stdout/stderr kept in step output and errors.
const OUTPUT_TAIL_LINES: usize = 20;

/// Runs each capability as `sh -c <command line>` in the working directory.
pub struct CommandBackend {
    working_dir: PathBuf,
    commands: CommandsConfig,
}

impl CommandBackend {
    pub fn new(working_dir: impl Into<PathBuf>, commands: CommandsConfig) -> Self {
        Self {
            working_dir: working_dir.into(),
            commands,
        }
    }

    /// Backend for `[pipeline.commands]`. Runs in the current directory
    /// unless `working_dir` is set.
    pub fn from_config(commands: &CommandsConfig) -> Self {
        let working_dir = commands
            .working_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(working_dir, commands.clone())
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    async fn run(&self, command_line: &str) -> Result<Output> {
        debug!(command = command_line, dir = %self.working_dir.display(), "running command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command_line)
            .current_dir(&self.working_dir)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(command = command_line, status = %output.status, stderr = %stderr.trim(), "command failed");
        }

        Ok(output)
    }

    /// Run `command_line` as `step`; a non-zero exit is a step failure.
    async fn run_checked(&self, step: &str, command_line: &str) -> Result<Value> {
        if command_line.trim().is_empty() {
            return Err(OrchestratorError::Configuration(format!(
                "no {} command configured",
                step
            )));
        }

        let output = self.run(command_line).await?;
        let exit_code = output.status.code();

        if !output.status.success() {
            let stderr = tail(&String::from_utf8_lossy(&output.stderr), OUTPUT_TAIL_LINES);
            let code = exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(OrchestratorError::step(
                step,
                format!("`{}` exited with {}: {}", command_line, code, stderr),
            ));
        }

        Ok(json!({
            "command": command_line,
            "exitCode": exit_code,
            "stdout": tail(&String::from_utf8_lossy(&output.stdout), OUTPUT_TAIL_LINES),
        }))
    }
}

impl DeployBackend for CommandBackend {
    fn variable(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }

    async fn current_branch(&self) -> Result<String> {
        let output = self.run_checked("branch", &self.commands.branch).await?;
        let branch = output["stdout"].as_str().unwrap_or_default().trim();
        if branch.is_empty() {
            return Err(OrchestratorError::step("branch", "branch query printed nothing"));
        }
        Ok(branch.to_string())
    }

    async fn build(&self) -> Result<Value> {
        self.run_checked("build", &self.commands.build).await
    }

    async fn run_tests(&self) -> Result<Value> {
        self.run_checked("tests", &self.commands.test).await
    }

    async fn deploy(&self, target: &EnvironmentConfig, production: bool) -> Result<Value> {
        let command_line = if production && !self.commands.production_flag.is_empty() {
            format!("{} {}", self.commands.deploy, self.commands.production_flag)
        } else {
            self.commands.deploy.clone()
        };
        debug!(environment = %target.name, production, "deploying");

        let mut output = self.run_checked("deploy", &command_line).await?;
        output["url"] = json!(target.url);
        Ok(output)
    }

    async fn revert_last_deployment(&self) -> Result<Value> {
        self.run_checked("rollback", &self.commands.revert).await
    }
}

/// Last `max_lines` lines of `text`, trimmed.
fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
