//! Orchestrator configuration.
//!
//! Loaded from `orchestrator.toml`. A missing file yields defaults and
//! every section is `#[serde(default)]`, so partial files work.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{OrchestratorError, Result};
use crate::types::{Environment, EnvironmentConfig};

pub const CONFIG_FILE: &str = "orchestrator.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub state: StateConfig,
    pub schedule: ScheduleConfig,
    pub health: HealthConfig,
    pub provider: ProviderConfig,
    pub pipeline: PipelineConfig,
    pub backup: BackupConfig,
    pub environments: EnvironmentsConfig,
}

impl OrchestratorConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path).await?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| OrchestratorError::Configuration(e.to_string()))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| OrchestratorError::Configuration(e.to_string()))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Directory the pipeline commands run in.
    pub fn working_dir(&self) -> PathBuf {
        self.pipeline
            .commands
            .working_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Pre-flight health target for a deploy to `env`.
    pub fn preflight_url(&self, env: Environment) -> String {
        self.pipeline
            .preflight_url
            .clone()
            .unwrap_or_else(|| self.environments.get(env).health_url(&self.health.path))
    }

    /// Validate configuration values for consistency.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.health.max_attempts == 0 {
            errors.push("health.max_attempts must be greater than 0".to_string());
        }
        if self.health.timeout_ms == 0 {
            errors.push("health.timeout_ms must be greater than 0".to_string());
        }
        if self.provider.base_url.trim().is_empty() {
            errors.push("provider.base_url must not be empty".to_string());
        }
        if self.environments.production.branch.trim().is_empty() {
            errors.push("environments.production.branch must not be empty".to_string());
        }
        for env in Environment::ALL {
            let target = self.environments.get(env);
            if target.url.trim().is_empty() {
                errors.push(format!("environments.{}.url must not be empty", env));
            }
            if target.health_check_timeout_ms == 0 {
                errors.push(format!(
                    "environments.{}.health_check_timeout_ms must be greater than 0",
                    env
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(OrchestratorError::Configuration(errors.join("; ")))
        }
    }
}

/// Where persisted documents live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub dir: PathBuf,
    /// Relative paths resolve against `dir`.
    pub reports_dir: PathBuf,
    pub backups_dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".automation"),
            reports_dir: PathBuf::from("reports"),
            backups_dir: PathBuf::from("backups"),
        }
    }
}

impl StateConfig {
    pub fn reports_path(&self) -> PathBuf {
        self.dir.join(&self.reports_dir)
    }

    pub fn backups_path(&self) -> PathBuf {
        self.dir.join(&self.backups_dir)
    }
}

/// What to do when a periodic trigger fires while the previous run of
/// the same kind is still in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Start another run anyway.
    #[default]
    Allow,
    /// Skip this tick.
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub sync_interval_secs: u64,
    pub backup_interval_secs: u64,
    pub health_interval_secs: u64,
    pub overlap: OverlapPolicy,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: 5 * 60,
            backup_interval_secs: 60 * 60,
            health_interval_secs: 60,
            overlap: OverlapPolicy::Allow,
        }
    }
}

impl ScheduleConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay_ms: u64,
    pub timeout_ms: u64,
    pub path: String,
    /// Environment variable holding the access-bypass credential for
    /// protected preview deployments.
    pub bypass_token_env: Option<String>,
    pub bypass_header: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 5_000,
            timeout_ms: 10_000,
            path: "/health".into(),
            bypass_token_env: Some("VERCEL_AUTOMATION_BYPASS_SECRET".into()),
            bypass_header: "x-vercel-protection-bypass".into(),
        }
    }
}

impl HealthConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve the bypass credential from the environment.
    pub fn bypass_token(&self) -> Option<String> {
        self.bypass_token_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub sync_path: String,
    pub analytics_path: String,
    pub timeout_ms: u64,
    /// Environment variable holding the provider API key (sent as bearer token).
    pub api_key_env: Option<String>,
    /// Directory of local campaign/donation JSON documents.
    pub data_dir: PathBuf,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api/payments".into(),
            sync_path: "/sync".into(),
            analytics_path: "/analytics".into(),
            timeout_ms: 30_000,
            api_key_env: Some("PAYMENT_API_KEY".into()),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl ProviderConfig {
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|v| !v.is_empty())
    }
}

/// How a failing `tests` step affects the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFailurePolicy {
    /// Record a warning, mark the step completed, keep going.
    #[default]
    Warn,
    /// Treat like any other step failure.
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Variables that must be set before anything runs.
    pub required_variables: Vec<String>,
    pub test_failure_policy: TestFailurePolicy,
    /// Target for the pre-flight health check. Defaults to the health
    /// endpoint of the environment being deployed.
    pub preflight_url: Option<String>,
    pub commands: CommandsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            required_variables: vec![
                "PAYMENT_SECRET_KEY".into(),
                "PAYMENT_PUBLISHABLE_KEY".into(),
            ],
            test_failure_policy: TestFailurePolicy::Warn,
            preflight_url: None,
            commands: CommandsConfig::default(),
        }
    }
}

/// Shell command lines for the external capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub working_dir: Option<PathBuf>,
    pub branch: String,
    pub build: String,
    pub test: String,
    pub deploy: String,
    /// Appended to `deploy` for production.
    pub production_flag: String,
    pub revert: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            branch: "git rev-parse --abbrev-ref HEAD".into(),
            build: "npm run build".into(),
            test: "npm test".into(),
            deploy: "vercel deploy --yes".into(),
            production_flag: "--prod".into(),
            revert: "vercel rollback --yes".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Critical configuration files, relative to the working directory.
    pub files: Vec<PathBuf>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            files: vec![
                PathBuf::from("package.json"),
                PathBuf::from("vercel.json"),
                PathBuf::from("next.config.js"),
                PathBuf::from(CONFIG_FILE),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentsConfig {
    pub development: EnvironmentConfig,
    pub staging: EnvironmentConfig,
    pub production: EnvironmentConfig,
}

impl Default for EnvironmentsConfig {
    fn default() -> Self {
        Self {
            development: EnvironmentConfig::default_for(Environment::Development),
            staging: EnvironmentConfig::default_for(Environment::Staging),
            production: EnvironmentConfig::default_for(Environment::Production),
        }
    }
}

impl EnvironmentsConfig {
    pub fn get(&self, env: Environment) -> &EnvironmentConfig {
        match env {
            Environment::Development => &self.development,
            Environment::Staging => &self.staging,
            Environment::Production => &self.production,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.schedule.sync_interval(), Duration::from_secs(300));
        assert_eq!(config.schedule.backup_interval(), Duration::from_secs(3600));
        assert_eq!(config.schedule.health_interval(), Duration::from_secs(60));
        assert_eq!(config.schedule.overlap, OverlapPolicy::Allow);
        assert_eq!(config.health.max_attempts, 3);
        assert_eq!(config.pipeline.test_failure_policy, TestFailurePolicy::Warn);
        assert_eq!(config.environments.production.branch, "main");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = OrchestratorConfig::from_toml(
            r#"
            [schedule]
            sync_interval_secs = 60
            overlap = "skip"

            [environments.production]
            name = "Production"
            url = "https://give.example.org"
            branch = "release"
            "#,
        )
        .unwrap();

        assert_eq!(config.schedule.sync_interval_secs, 60);
        assert_eq!(config.schedule.backup_interval_secs, 3600);
        assert_eq!(config.schedule.overlap, OverlapPolicy::Skip);
        assert_eq!(config.environments.production.branch, "release");
        assert!(!config.environments.production.requires_approval);
        assert_eq!(
            config.environments.production.health_check_timeout_ms,
            30_000
        );
        assert_eq!(config.environments.staging.branch, "staging");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = OrchestratorConfig::default();
        config.health.max_attempts = 0;
        config.environments.production.branch = String::new();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_attempts"));
        assert!(err.contains("production.branch"));
    }

    #[test]
    fn test_validate_rejects_zero_environment_timeout() {
        let mut config = OrchestratorConfig::default();
        config.environments.staging.health_check_timeout_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(
            err.contains("environments.staging.health_check_timeout_ms"),
            "{}",
            err
        );
        assert!(!err.contains("production.health_check_timeout_ms"));
    }

    #[test]
    fn test_preflight_url_defaults_to_environment_health() {
        let mut config = OrchestratorConfig::default();
        assert_eq!(
            config.preflight_url(Environment::Staging),
            "https://staging.example.org/health"
        );

        config.pipeline.preflight_url = Some("http://localhost:3000/health".into());
        assert_eq!(
            config.preflight_url(Environment::Production),
            "http://localhost:3000/health"
        );
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = OrchestratorConfig::from_toml("schedule = 5").unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration(_)));
    }

    #[test]
    fn test_paths_resolve_against_state_dir() {
        let state = StateConfig {
            dir: PathBuf::from("/var/lib/orch"),
            ..Default::default()
        };
        assert_eq!(state.reports_path(), PathBuf::from("/var/lib/orch/reports"));
        assert_eq!(state.backups_path(), PathBuf::from("/var/lib/orch/backups"));
    }

    #[test]
    fn test_provider_endpoint() {
        let provider = ProviderConfig {
            base_url: "https://api.example.org/payments/".into(),
            ..Default::default()
        };
        assert_eq!(
            provider.endpoint("/sync"),
            "https://api.example.org/payments/sync"
        );
    }

    #[tokio::test]
    async fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = OrchestratorConfig::load(&dir.path().join(CONFIG_FILE))
            .await
            .unwrap();
        assert_eq!(config.health.path, "/health");
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = OrchestratorConfig::default();
        config.schedule.sync_interval_secs = 42;
        config.save(&path).await.unwrap();

        let loaded = OrchestratorConfig::load(&path).await.unwrap();
        assert_eq!(loaded.schedule.sync_interval_secs, 42);
    }
}
