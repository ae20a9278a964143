//! Deployment Pipeline Engine
//!
//! Runs the environment's step plan in order, stops at the first
//! failure, rolls production back when a backup exists, and records
//! every run in the deployment history. Steps never run in parallel:
//! each one depends on the ones before it.

use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::backend::DeployBackend;
use crate::backup::BackupManager;
use crate::config::{OrchestratorConfig, TestFailurePolicy};
use crate::error::{OrchestratorError, Result};
use crate::health::{HealthProbe, HealthVerifier};
use crate::rollback::RollbackManager;
use crate::runner::StepRunner;
use crate::state::{DeploymentState, Step, StepOutcome, StepResult};
use crate::store::{
    DeploymentHistory, DeploymentRecord, RollbackEntry, RollbackResult, StateStore,
};
use crate::types::{Environment, EnvironmentConfig};

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Leave the `tests` step out of the plan.
    pub skip_tests: bool,
    /// Leave the production `backup` step out of the plan. Disables rollback.
    pub skip_backup: bool,
    /// Deploy to environments that require approval.
    pub force: bool,
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub state: DeploymentState,
    pub record: DeploymentRecord,
    pub rollback: Option<RollbackEntry>,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.record.success
    }
}

/// The deployment pipeline.
///
/// Parameterized by the backend and the health probe; you provide
/// the implementations.
pub struct DeploymentPipeline<'a, B: DeployBackend, P: HealthProbe> {
    backend: &'a B,
    health: &'a HealthVerifier<P>,
    store: &'a StateStore,
    backups: &'a BackupManager,
    config: &'a OrchestratorConfig,
}

impl<'a, B: DeployBackend, P: HealthProbe> DeploymentPipeline<'a, B, P> {
    pub fn new(
        backend: &'a B,
        health: &'a HealthVerifier<P>,
        store: &'a StateStore,
        backups: &'a BackupManager,
        config: &'a OrchestratorConfig,
    ) -> Self {
        Self {
            backend,
            health,
            store,
            backups,
            config,
        }
    }

    /// Run the full pipeline for `env`.
    ///
    /// Step failures don't surface as `Err`: they end the run as failed
    /// and are reported in the outcome. `Err` means the state machine
    /// itself was misused.
    pub async fn run(&self, env: Environment, options: PipelineOptions) -> Result<PipelineOutcome> {
        let target = self.config.environments.get(env);
        let mut state = DeploymentState::new(env);
        state.begin()?;
        info!(environment = %env, url = %target.url, "deployment started");

        let mut failure: Option<OrchestratorError> = None;

        for step in Step::plan(env, options.skip_tests, options.skip_backup) {
            let work = self.execute(step, env, target, options);
            match StepRunner::run(step.name(), work).await {
                Ok(result) => {
                    state.record_step(result)?;
                    if step == Step::Backup {
                        state.mark_rollback_available()?;
                    }
                }
                Err(failed) if step == Step::Tests && self.tests_are_advisory() => {
                    warn!(error = %failed.error, "tests failed, continuing");
                    state
                        .warnings
                        .push(format!("tests failed (continuing): {}", failed.error));
                    state.record_step(downgrade(failed.result))?;
                }
                Err(failed) => {
                    state.record_step(failed.result)?;
                    failure = Some(failed.error);
                    break;
                }
            }
        }

        let mut rollback = None;
        match failure {
            None => {
                state.complete()?;
                info!(
                    environment = %env,
                    duration_ms = state.elapsed_ms(),
                    "deployment completed"
                );
            }
            Some(e) => {
                error!(environment = %env, error = %e, "deployment failed");
                state.fail(e.to_string())?;

                if env.is_production() && state.rollback_available {
                    let entry = RollbackManager::new(self.backend, self.store)
                        .rollback()
                        .await;
                    if let RollbackResult::Failed { error } = &entry.result {
                        state
                            .errors
                            .push(OrchestratorError::Rollback(error.clone()).to_string());
                    }
                    rollback = Some(entry);
                }
            }
        }

        let record = DeploymentRecord::from_state(&state)?;
        let mut history: DeploymentHistory = self.store.load().await;
        history.record(record.clone());
        self.store.save(&history).await;

        Ok(PipelineOutcome {
            state,
            record,
            rollback,
        })
    }

    fn tests_are_advisory(&self) -> bool {
        self.config.pipeline.test_failure_policy == TestFailurePolicy::Warn
    }

    async fn execute(
        &self,
        step: Step,
        env: Environment,
        target: &EnvironmentConfig,
        options: PipelineOptions,
    ) -> Result<Value> {
        match step {
            Step::PreValidation => self.pre_validate(env, target, options).await,
            Step::HealthCheck => {
                let url = self.config.preflight_url(env);
                to_output(&self.health.verify(&url).await?)
            }
            Step::Build => self.backend.build().await,
            Step::Tests => self.backend.run_tests().await,
            Step::Backup => to_output(&self.backups.create_backup().await?),
            Step::Deploy => self.backend.deploy(target, env.is_production()).await,
            Step::Verification => {
                let url = target.health_url(&self.config.health.path);
                let report = self
                    .health
                    .verify_with(
                        &url,
                        self.config.health.max_attempts,
                        self.config.health.delay(),
                        Duration::from_millis(target.health_check_timeout_ms),
                    )
                    .await?;
                to_output(&report)
            }
        }
    }

    async fn pre_validate(
        &self,
        env: Environment,
        target: &EnvironmentConfig,
        options: PipelineOptions,
    ) -> Result<Value> {
        let missing: Vec<&str> = self
            .config
            .pipeline
            .required_variables
            .iter()
            .map(String::as_str)
            .filter(|name| self.backend.variable(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(OrchestratorError::Configuration(format!(
                "missing required variables: {}",
                missing.join(", ")
            )));
        }

        if target.requires_approval && !options.force {
            return Err(OrchestratorError::Configuration(format!(
                "{} deployments require approval; re-run with --force",
                target.name
            )));
        }

        let mut output = json!({
            "environment": env,
            "variables": self.config.pipeline.required_variables.len(),
        });

        if env.is_production() {
            let branch = self.backend.current_branch().await?;
            if branch != target.branch {
                return Err(OrchestratorError::Configuration(format!(
                    "production deploys must run from '{}' (current branch: '{}')",
                    target.branch, branch
                )));
            }
            output["branch"] = Value::String(branch);
        }

        Ok(output)
    }
}

/// Turn a failed advisory step into a completed one carrying the reason.
fn downgrade(result: StepResult) -> StepResult {
    let reason = result.error().unwrap_or_default().to_string();
    StepResult {
        outcome: StepOutcome::Completed {
            output: json!({ "skipped": true, "reason": reason }),
        },
        ..result
    }
}

fn to_output<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| OrchestratorError::Persistence(format!("failed to encode step output: {}", e)))
}
