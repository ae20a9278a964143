//! External capabilities the orchestrator drives.
//!
//! The pipeline and the sync loop are pure sequencing logic. They
//! don't know how a build runs, which platform CLI publishes, or where
//! campaign documents live. That's the backend's problem.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

use crate::error::Result;
use crate::types::EnvironmentConfig;

/// Everything the deployment pipeline needs from the outside world.
///
/// Abstracts:
/// - Environment variable lookup (pre-validation)
/// - Source control (current branch)
/// - Build, test and publish commands
/// - Reverting the last published deployment
pub trait DeployBackend: Send + Sync {
    // ═══════════════════════════════════════════════════════════════
    // PRE-FLIGHT
    // ═══════════════════════════════════════════════════════════════

    /// Look up a configuration variable. `None` if unset or empty.
    fn variable(&self, name: &str) -> Option<String>;

    /// Name of the currently checked-out branch.
    fn current_branch(&self) -> impl Future<Output = Result<String>> + Send;

    // ═══════════════════════════════════════════════════════════════
    // BUILD / TEST / PUBLISH
    // ═══════════════════════════════════════════════════════════════

    /// Run the project build.
    fn build(&self) -> impl Future<Output = Result<Value>> + Send;

    /// Run the test suite.
    fn run_tests(&self) -> impl Future<Output = Result<Value>> + Send;

    /// Publish to `target`. `production` selects the platform's production flag.
    fn deploy(
        &self,
        target: &EnvironmentConfig,
        production: bool,
    ) -> impl Future<Output = Result<Value>> + Send;

    // ═══════════════════════════════════════════════════════════════
    // ROLLBACK
    // ═══════════════════════════════════════════════════════════════

    /// Revert the platform to the previous deployment.
    fn revert_last_deployment(&self) -> impl Future<Output = Result<Value>> + Send;
}

/// Everything the sync loop needs from the payment provider and the
/// local campaign/donation documents.
///
/// Sync calls are expected to be idempotent on the provider side.
#[async_trait]
pub trait SyncBackend: Send + Sync {
    // ═══════════════════════════════════════════════════════════════
    // PAYMENT PROVIDER
    // ═══════════════════════════════════════════════════════════════

    /// Trigger the provider's sync endpoint and return its response.
    async fn sync_payments(&self) -> Result<Value>;

    /// Fetch the provider's analytics snapshot.
    async fn fetch_analytics(&self) -> Result<Value>;

    // ═══════════════════════════════════════════════════════════════
    // LOCAL DOCUMENTS
    // ═══════════════════════════════════════════════════════════════

    /// Read a named JSON document. `Ok(None)` if it doesn't exist.
    async fn read_document(&self, name: &str) -> Result<Option<Value>>;

    /// Write a named JSON document, replacing any previous content.
    async fn write_document(&self, name: &str, document: &Value) -> Result<()>;
}
