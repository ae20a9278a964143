//! Persisted orchestration documents.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::store::DeploymentRecord;

/// Most recent deployments kept in history. Oldest are dropped first.
pub const MAX_DEPLOYMENTS: usize = 50;

/// A JSON document with a fixed file name and a well-defined default.
///
/// The default is what [`StateStore::load`](crate::store::StateStore::load)
/// hands back when the file is missing or unreadable.
pub trait Document: Serialize + DeserializeOwned + Default + Send + Sync {
    /// File stem under the state directory.
    const KEY: &'static str;
}

/// Deployment history: bounded record list plus the rollback log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentHistory {
    /// Newest last.
    pub deployments: Vec<DeploymentRecord>,
    pub last_deployment: Option<DeploymentRecord>,
    pub rollbacks: Vec<RollbackEntry>,
}

impl Document for DeploymentHistory {
    const KEY: &'static str = "deployment-history";
}

impl DeploymentHistory {
    /// Append a run and evict the oldest entries past [`MAX_DEPLOYMENTS`].
    pub fn record(&mut self, record: DeploymentRecord) {
        self.last_deployment = Some(record.clone());
        self.deployments.push(record);
        if self.deployments.len() > MAX_DEPLOYMENTS {
            let excess = self.deployments.len() - MAX_DEPLOYMENTS;
            self.deployments.drain(..excess);
        }
    }

    pub fn record_rollback(&mut self, entry: RollbackEntry) {
        self.rollbacks.push(entry);
    }

    /// Up to `n` most recent deployments, newest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &DeploymentRecord> {
        self.deployments.iter().rev().take(n)
    }
}

/// Outcome of a revert call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RollbackResult {
    Succeeded { output: serde_json::Value },
    Failed { error: String },
}

impl RollbackResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RollbackResult::Succeeded { .. })
    }
}

/// One automatic rollback attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackEntry {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub result: RollbackResult,
}

/// Cumulative sync counters. Survive restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncStats {
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub errors: u64,
    /// Overwritten on each failure.
    pub last_error: Option<String>,
    /// Set only on success.
    pub last_sync: Option<DateTime<Utc>>,
}

impl Document for SyncStats {
    const KEY: &'static str = "automation_state";
}

impl SyncStats {
    pub fn record_attempt(&mut self) {
        self.total_syncs += 1;
    }

    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.successful_syncs += 1;
        self.last_sync = Some(at);
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.errors += 1;
        self.last_error = Some(error.into());
    }
}
