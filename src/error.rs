//! Error types for the deployment pipeline and sync orchestrator.
//!
//! No `anyhow` leakage. Explicit, typed errors.

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("step '{step}' failed: {message}")]
    StepExecution { step: String, message: String },

    #[error("network error: {0}")]
    TransientNetwork(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("rollback failed: {0}")]
    Rollback(String),

    #[error("invalid pipeline state: {0}")]
    InvalidState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Build a step failure.
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StepExecution {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Whether this error might be recoverable by retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, OrchestratorError::TransientNetwork(_))
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
