//! Single-step execution with timing.
//!
//! The runner observes and records. It never swallows a failure: the
//! caller gets the recorded [`StepResult`] either way and decides
//! whether the pipeline goes on.

use std::future::Future;

use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, Result};
use crate::state::{StepOutcome, StepResult};

/// A step that failed, with its recorded result and the original error.
#[derive(Debug)]
pub struct StepFailure {
    pub result: StepResult,
    pub error: OrchestratorError,
}

/// Executes named units of work.
pub struct StepRunner;

impl StepRunner {
    /// Run `work` as the step `name`.
    ///
    /// Start time is taken before the future is polled; end time and
    /// duration are stamped after it resolves, whatever the outcome.
    pub async fn run<F>(name: &str, work: F) -> std::result::Result<StepResult, StepFailure>
    where
        F: Future<Output = Result<serde_json::Value>>,
    {
        let pending = StepResult::started(name);
        debug!(step = name, "step started");

        match work.await {
            Ok(output) => {
                let result = pending.finish(StepOutcome::Completed { output });
                info!(
                    step = name,
                    duration_ms = result.duration_ms.unwrap_or_default(),
                    "step completed"
                );
                Ok(result)
            }
            Err(error) => {
                let result = pending.finish(StepOutcome::Failed {
                    error: error.to_string(),
                });
                warn!(
                    step = name,
                    duration_ms = result.duration_ms.unwrap_or_default(),
                    error = %error,
                    "step failed"
                );
                Err(StepFailure { result, error })
            }
        }
    }
}
