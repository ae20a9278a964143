//! In-memory backends for unit tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::backend::{DeployBackend, SyncBackend};
use crate::error::{OrchestratorError, Result};
use crate::types::EnvironmentConfig;

/// Scriptable [`DeployBackend`]. Records build/tests/deploy/revert calls.
#[derive(Default)]
pub(crate) struct FakeDeployBackend {
    pub branch: String,
    pub variables: HashMap<String, String>,
    pub fail_build: bool,
    pub fail_tests: bool,
    pub fail_deploy: bool,
    pub fail_revert: bool,
    pub calls: Mutex<Vec<String>>,
    pub deploy_flags: Mutex<Vec<bool>>,
}

impl FakeDeployBackend {
    /// On `main`, default required variables set, nothing fails.
    pub(crate) fn healthy() -> Self {
        let variables = ["PAYMENT_SECRET_KEY", "PAYMENT_PUBLISHABLE_KEY"]
            .into_iter()
            .map(|k| (k.to_string(), "set".to_string()))
            .collect();
        Self {
            branch: "main".into(),
            variables,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn deploy_flags(&self) -> Vec<bool> {
        self.deploy_flags.lock().clone()
    }

    fn call(&self, name: &str, fail: bool) -> Result<Value> {
        self.calls.lock().push(name.to_string());
        if fail {
            Err(OrchestratorError::step(name, "exit status 1"))
        } else {
            Ok(json!({ "command": name, "exitCode": 0 }))
        }
    }
}

impl DeployBackend for FakeDeployBackend {
    fn variable(&self, name: &str) -> Option<String> {
        self.variables.get(name).cloned()
    }

    async fn current_branch(&self) -> Result<String> {
        Ok(self.branch.clone())
    }

    async fn build(&self) -> Result<Value> {
        self.call("build", self.fail_build)
    }

    async fn run_tests(&self) -> Result<Value> {
        self.call("tests", self.fail_tests)
    }

    async fn deploy(&self, _target: &EnvironmentConfig, production: bool) -> Result<Value> {
        self.deploy_flags.lock().push(production);
        self.call("deploy", self.fail_deploy)
    }

    async fn revert_last_deployment(&self) -> Result<Value> {
        self.call("revert", self.fail_revert)
    }
}

/// [`SyncBackend`] over an in-memory document map.
#[derive(Default)]
pub(crate) struct MemorySyncBackend {
    pub documents: Mutex<HashMap<String, Value>>,
    pub fail_payments: bool,
    pub fail_analytics: bool,
    pub fail_writes: bool,
    /// Simulated provider latency.
    pub latency: Duration,
}

impl MemorySyncBackend {
    pub(crate) fn with_document(self, name: &str, document: Value) -> Self {
        self.documents.lock().insert(name.to_string(), document);
        self
    }

    pub(crate) fn document(&self, name: &str) -> Option<Value> {
        self.documents.lock().get(name).cloned()
    }
}

#[async_trait]
impl SyncBackend for MemorySyncBackend {
    async fn sync_payments(&self) -> Result<Value> {
        tokio::time::sleep(self.latency).await;
        if self.fail_payments {
            return Err(OrchestratorError::TransientNetwork(
                "payment provider returned HTTP 502".into(),
            ));
        }
        Ok(json!({ "synced": 4 }))
    }

    async fn fetch_analytics(&self) -> Result<Value> {
        tokio::time::sleep(self.latency).await;
        if self.fail_analytics {
            return Err(OrchestratorError::TransientNetwork("analytics timed out".into()));
        }
        Ok(json!({ "totalRaised": 1250, "donors": 17 }))
    }

    async fn read_document(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.document(name))
    }

    async fn write_document(&self, name: &str, document: &Value) -> Result<()> {
        if self.fail_writes {
            return Err(OrchestratorError::Persistence(format!(
                "read-only data dir, cannot write {}",
                name
            )));
        }
        self.documents
            .lock()
            .insert(name.to_string(), document.clone());
        Ok(())
    }
}
