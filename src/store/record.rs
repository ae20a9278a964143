//! [`DeploymentRecord`]: persisted snapshot of one pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};
use crate::state::{DeploymentState, StepResult};
use crate::types::Environment;

/// Historical record of a finished pipeline run.
///
/// Mirrors [`DeploymentState`] once it has reached a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub id: String,
    pub environment: Environment,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl DeploymentRecord {
    /// Snapshot a finished run.
    ///
    /// Returns an error if the run hasn't reached a terminal status.
    pub fn from_state(state: &DeploymentState) -> Result<Self> {
        if !state.is_terminal() {
            return Err(OrchestratorError::InvalidState(format!(
                "cannot record a run that is {}",
                state.status
            )));
        }

        Ok(Self {
            id: new_record_id(state.started_at),
            environment: state.environment,
            timestamp: state.started_at,
            success: state.is_complete(),
            duration_ms: state.elapsed_ms(),
            steps: state.steps.clone(),
            error: state.errors.first().cloned(),
            warnings: state.warnings.clone(),
        })
    }
}

/// Time-based id with a random suffix.
fn new_record_id(at: DateTime<Utc>) -> String {
    format!(
        "deploy-{}-{:06x}",
        at.timestamp_millis(),
        rand::random::<u32>() & 0x00ff_ffff
    )
}
