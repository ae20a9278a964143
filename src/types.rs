//! Minimal domain types for the deployment pipeline.
//!
//! These are the types the pipeline and the sync loop share. Nothing more.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::OrchestratorError;

/// Deployment target environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 3] = [
        Environment::Development,
        Environment::Staging,
        Environment::Production,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "preview" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(OrchestratorError::Configuration(format!(
                "unknown environment '{}' (expected development, staging or production)",
                other
            ))),
        }
    }
}

/// Per-environment deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    /// Public URL of the deployed site; verification probes `url + health path`.
    pub url: String,
    /// Source-control branch that may be deployed here.
    pub branch: String,
    #[serde(default)]
    pub requires_approval: bool,
    /// Per-attempt timeout for health checks against this environment.
    #[serde(default = "default_health_check_timeout_ms")]
    pub health_check_timeout_ms: u64,
}

fn default_health_check_timeout_ms() -> u64 {
    30_000
}

impl EnvironmentConfig {
    /// Built-in defaults for an environment.
    pub fn default_for(env: Environment) -> Self {
        match env {
            Environment::Development => Self {
                name: "Development".into(),
                url: "http://localhost:3000".into(),
                branch: "develop".into(),
                requires_approval: false,
                health_check_timeout_ms: 10_000,
            },
            Environment::Staging => Self {
                name: "Staging".into(),
                url: "https://staging.example.org".into(),
                branch: "staging".into(),
                requires_approval: false,
                health_check_timeout_ms: 30_000,
            },
            Environment::Production => Self {
                name: "Production".into(),
                url: "https://www.example.org".into(),
                branch: "main".into(),
                requires_approval: true,
                health_check_timeout_ms: 60_000,
            },
        }
    }

    /// Health endpoint for this environment.
    pub fn health_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Lifecycle status of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}
