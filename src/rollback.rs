//! Automatic rollback after a failed production deployment.
//!
//! One attempt, no retry. The outcome goes into the rollback log of
//! the deployment history; it never changes the failed run's status.

use chrono::Utc;
use tracing::{error, info};

use crate::backend::DeployBackend;
use crate::store::{DeploymentHistory, RollbackEntry, RollbackResult, StateStore};

pub const AUTOMATIC_ROLLBACK_REASON: &str = "automatic rollback after failed deployment";

pub struct RollbackManager<'a, B: DeployBackend> {
    backend: &'a B,
    store: &'a StateStore,
}

impl<'a, B: DeployBackend> RollbackManager<'a, B> {
    pub fn new(backend: &'a B, store: &'a StateStore) -> Self {
        Self { backend, store }
    }

    /// Revert the last deployment and log the attempt.
    pub async fn rollback(&self) -> RollbackEntry {
        self.rollback_with_reason(AUTOMATIC_ROLLBACK_REASON).await
    }

    pub async fn rollback_with_reason(&self, reason: &str) -> RollbackEntry {
        info!(reason, "starting rollback");

        let result = match self.backend.revert_last_deployment().await {
            Ok(output) => {
                info!("rollback completed");
                RollbackResult::Succeeded { output }
            }
            Err(e) => {
                error!(error = %e, "rollback failed");
                RollbackResult::Failed {
                    error: e.to_string(),
                }
            }
        };

        let entry = RollbackEntry {
            timestamp: Utc::now(),
            reason: reason.to_string(),
            result,
        };

        let mut history: DeploymentHistory = self.store.load().await;
        history.record_rollback(entry.clone());
        self.store.save(&history).await;

        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDeployBackend;

    #[tokio::test]
    async fn test_successful_rollback_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let backend = FakeDeployBackend::healthy();

        let entry = RollbackManager::new(&backend, &store).rollback().await;

        assert!(entry.result.is_success());
        assert_eq!(entry.reason, AUTOMATIC_ROLLBACK_REASON);
        assert_eq!(backend.calls(), vec!["revert"]);

        let history: DeploymentHistory = store.load().await;
        assert_eq!(history.rollbacks, vec![entry]);
    }

    #[tokio::test]
    async fn test_failed_rollback_is_logged_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let backend = FakeDeployBackend {
            fail_revert: true,
            ..FakeDeployBackend::healthy()
        };

        let entry = RollbackManager::new(&backend, &store).rollback().await;

        assert!(!entry.result.is_success());
        // No retry.
        assert_eq!(backend.calls(), vec!["revert"]);

        let history: DeploymentHistory = store.load().await;
        assert_eq!(history.rollbacks.len(), 1);
        assert!(history.deployments.is_empty());
    }
}
