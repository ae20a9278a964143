//! Deployment state machine definition.
//!
//! The state is the complete snapshot of one pipeline run. It's
//! serializable, and it only moves forward: idle → running →
//! {completed, failed}. A new run gets a fresh state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};
use crate::types::{Environment, RunStatus};

/// Pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// Required variables present, production branch matches.
    PreValidation,
    /// Probe the current system before touching anything.
    HealthCheck,
    /// External build.
    Build,
    /// External test run. Advisory unless the test policy says otherwise.
    Tests,
    /// Snapshot of critical configuration files. Production only.
    Backup,
    /// Platform publish.
    Deploy,
    /// Probe the freshly deployed target.
    Verification,
}

impl Step {
    /// Step name as recorded in history.
    pub fn name(&self) -> &'static str {
        match self {
            Step::PreValidation => "pre-validation",
            Step::HealthCheck => "health-check",
            Step::Build => "build",
            Step::Tests => "tests",
            Step::Backup => "backup",
            Step::Deploy => "deploy",
            Step::Verification => "verification",
        }
    }

    /// The step sequence for an environment.
    pub fn plan(env: Environment, skip_tests: bool, skip_backup: bool) -> Vec<Step> {
        let mut steps = vec![Step::PreValidation, Step::HealthCheck, Step::Build];
        if !skip_tests {
            steps.push(Step::Tests);
        }
        if env.is_production() && !skip_backup {
            steps.push(Step::Backup);
        }
        steps.push(Step::Deploy);
        steps.push(Step::Verification);
        steps
    }
}

/// How a step ended. Exactly one of output or error once terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepOutcome {
    Running,
    Completed { output: serde_json::Value },
    Failed { error: String },
}

/// Recorded execution of a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl StepResult {
    /// A step that has started but not finished.
    pub fn started(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            outcome: StepOutcome::Running,
        }
    }

    /// Close the step with its outcome, stamping end time and duration.
    pub fn finish(mut self, outcome: StepOutcome) -> Self {
        let ended = Utc::now();
        let elapsed = (ended - self.started_at).num_milliseconds().max(0) as u64;
        self.ended_at = Some(ended);
        self.duration_ms = Some(elapsed);
        self.outcome = outcome;
        self
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, StepOutcome::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, StepOutcome::Failed { .. })
    }

    pub fn output(&self) -> Option<&serde_json::Value> {
        match &self.outcome {
            StepOutcome::Completed { output } => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            StepOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Live state of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentState {
    pub environment: Environment,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<StepResult>,
    pub errors: Vec<String>,
    /// Failures that were downgraded and did not stop the run.
    #[serde(default)]
    pub warnings: Vec<String>,
    pub rollback_available: bool,
}

impl DeploymentState {
    /// Create a new idle state.
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            status: RunStatus::Idle,
            started_at: Utc::now(),
            steps: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            rollback_available: false,
        }
    }

    /// idle → running.
    pub fn begin(&mut self) -> Result<()> {
        if self.status != RunStatus::Idle {
            return Err(OrchestratorError::InvalidState(format!(
                "cannot start a run that is {}",
                self.status
            )));
        }
        self.status = RunStatus::Running;
        self.started_at = Utc::now();
        Ok(())
    }

    /// Append a finished step. Names are unique within a run.
    pub fn record_step(&mut self, step: StepResult) -> Result<()> {
        if self.status != RunStatus::Running {
            return Err(OrchestratorError::InvalidState(format!(
                "cannot record step '{}' while {}",
                step.name, self.status
            )));
        }
        if self.steps.iter().any(|s| s.name == step.name) {
            return Err(OrchestratorError::InvalidState(format!(
                "step '{}' already recorded",
                step.name
            )));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Enable rollback. Only valid after a completed backup step.
    pub fn mark_rollback_available(&mut self) -> Result<()> {
        let backed_up = self
            .steps
            .iter()
            .any(|s| s.name == Step::Backup.name() && s.is_completed());
        if !backed_up {
            return Err(OrchestratorError::InvalidState(
                "rollback requires a completed backup step".into(),
            ));
        }
        self.rollback_available = true;
        Ok(())
    }

    /// running → completed.
    pub fn complete(&mut self) -> Result<()> {
        self.finish(RunStatus::Completed)
    }

    /// running → failed.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.errors.push(error.into());
        self.finish(RunStatus::Failed)
    }

    fn finish(&mut self, status: RunStatus) -> Result<()> {
        if self.status != RunStatus::Running {
            return Err(OrchestratorError::InvalidState(format!(
                "cannot move from {} to {}",
                self.status, status
            )));
        }
        self.status = status;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Milliseconds since the run started.
    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }
}
