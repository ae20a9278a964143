//! [`SyncBackend`] over the payment provider's HTTP API and a directory
//! of local JSON documents.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::SyncBackend;
use crate::config::ProviderConfig;
use crate::error::{OrchestratorError, Result};

pub struct ProviderBackend {
    client: Client,
    sync_url: String,
    analytics_url: String,
    api_key: Option<String>,
    timeout: Duration,
    documents: DocumentDir,
}

impl ProviderBackend {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("campaign-orchestrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                OrchestratorError::Configuration(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            sync_url: config.endpoint(&config.sync_path),
            analytics_url: config.endpoint(&config.analytics_path),
            api_key: config.api_key(),
            timeout: config.timeout(),
            documents: DocumentDir::new(&config.data_dir),
        })
    }

    pub fn documents(&self) -> &DocumentDir {
        &self.documents
    }

    async fn send(&self, what: &str, request: RequestBuilder) -> Result<Value> {
        let mut request = request.timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            warn!(request = what, error = %e, "provider request failed");
            OrchestratorError::TransientNetwork(format!("{} request failed: {}", what, e))
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(request = what, status = status.as_u16(), "provider responded");

        if !status.is_success() {
            return Err(status_error(what, status, &body));
        }
        Ok(parse_body(&body))
    }
}

#[async_trait]
impl SyncBackend for ProviderBackend {
    async fn sync_payments(&self) -> Result<Value> {
        self.send("payment sync", self.client.post(&self.sync_url))
            .await
    }

    async fn fetch_analytics(&self) -> Result<Value> {
        self.send("analytics", self.client.get(&self.analytics_url))
            .await
    }

    async fn read_document(&self, name: &str) -> Result<Option<Value>> {
        self.documents.read(name).await
    }

    async fn write_document(&self, name: &str, document: &Value) -> Result<()> {
        self.documents.write(name, document).await
    }
}

/// Rate limiting and server errors are worth retrying; anything else
/// is the request's fault.
fn status_error(what: &str, status: StatusCode, body: &str) -> OrchestratorError {
    let message = format!("{} returned HTTP {}: {}", what, status.as_u16(), body.trim());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        OrchestratorError::TransientNetwork(message)
    } else {
        OrchestratorError::step(what, message)
    }
}

/// JSON if it parses, otherwise the raw text under `body`.
fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::json!({ "body": body }))
}

/// Named JSON documents stored as `{dir}/{name}.json`.
#[derive(Debug, Clone)]
pub struct DocumentDir {
    dir: PathBuf,
}

impl DocumentDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(OrchestratorError::Configuration(format!(
                "invalid document name: {:?}",
                name
            )));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }

    pub async fn read(&self, name: &str) -> Result<Option<Value>> {
        let path = self.path(name)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map(Some).map_err(|e| {
            OrchestratorError::Persistence(format!("corrupt document {}: {}", path.display(), e))
        })
    }

    pub async fn write(&self, name: &str, document: &Value) -> Result<()> {
        let path = self.path(name)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let content = serde_json::to_string_pretty(document).map_err(|e| {
            OrchestratorError::Persistence(format!("failed to serialize {}: {}", name, e))
        })?;
        let tmp = path.with_extension(format!("json.tmp-{:08x}", rand::random::<u32>()));
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_document_round_trip_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let docs = DocumentDir::new(dir.path().join("data"));

        assert_eq!(docs.read("campaigns").await.unwrap(), None);

        let campaigns = json!([{"id": "a", "goal": 10}]);
        docs.write("campaigns", &campaigns).await.unwrap();
        assert_eq!(docs.read("campaigns").await.unwrap(), Some(campaigns));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("donations.json"), "{ nope").unwrap();
        let docs = DocumentDir::new(dir.path());

        let err = docs.read("donations").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_document_names_cannot_escape_dir() {
        let dir = tempfile::tempdir().unwrap();
        let docs = DocumentDir::new(dir.path());

        for name in ["../etc/passwd", "a/b", "", "x.json"] {
            assert!(docs.read(name).await.is_err(), "{}", name);
        }
    }

    #[test]
    fn test_status_classification() {
        let err = status_error("payment sync", StatusCode::BAD_GATEWAY, "upstream");
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("HTTP 502"));

        assert!(status_error("x", StatusCode::TOO_MANY_REQUESTS, "").is_recoverable());

        let err = status_error("analytics", StatusCode::UNAUTHORIZED, "bad key");
        assert!(!err.is_recoverable());
        assert!(matches!(err, OrchestratorError::StepExecution { .. }));
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(r#"{"synced": 3}"#), json!({"synced": 3}));
        assert_eq!(parse_body("  "), Value::Null);
        assert_eq!(parse_body("ok"), json!({"body": "ok"}));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig {
            base_url: "http://127.0.0.1:1/api".into(),
            timeout_ms: 500,
            api_key_env: None,
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let backend = ProviderBackend::from_config(&config).unwrap();

        let err = backend.sync_payments().await.unwrap_err();
        assert!(err.is_recoverable(), "{}", err);
        assert_eq!(backend.documents().dir(), dir.path());
    }
}
