//! File-backed state store.
//!
//! Stores each [`Document`] as `{state_dir}/{KEY}.json` and sync reports
//! as one file per run under `{state_dir}/reports/`.
//!
//! Reads never fail: a missing or corrupt file yields the document's
//! default. Writes go through a temp file and a rename. One orchestrator
//! process per state directory is assumed; there is no locking.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::StateConfig;
use crate::error::{OrchestratorError, Result};
use crate::store::Document;

/// Loads and persists orchestration documents.
#[derive(Debug, Clone)]
pub struct StateStore {
    state_dir: PathBuf,
    reports_dir: PathBuf,
}

impl StateStore {
    /// Create a store rooted at `state_dir`, with reports in `state_dir/reports`.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        let reports_dir = state_dir.join("reports");
        Self {
            state_dir,
            reports_dir,
        }
    }

    pub fn from_config(config: &StateConfig) -> Self {
        Self {
            state_dir: config.dir.clone(),
            reports_dir: config.reports_path(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    pub fn document_path<D: Document>(&self) -> PathBuf {
        self.state_dir.join(format!("{}.json", D::KEY))
    }

    /// Load a document, falling back to its default on any failure.
    pub async fn load<D: Document>(&self) -> D {
        let path = self.document_path::<D>();

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(document = D::KEY, "no persisted document, using default");
                return D::default();
            }
            Err(e) => {
                warn!(document = D::KEY, error = %e, "failed to read document, using default");
                return D::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(document = D::KEY, error = %e, "corrupt document, using default");
                D::default()
            }
        }
    }

    /// Persist a document. Failures are logged, not returned: the
    /// caller's in-memory copy stays authoritative.
    pub async fn save<D: Document>(&self, document: &D) {
        if let Err(e) = self.try_save(document).await {
            warn!(document = D::KEY, error = %e, "failed to persist document");
        }
    }

    /// Persist a document, surfacing failures.
    pub async fn try_save<D: Document>(&self, document: &D) -> Result<()> {
        write_json(&self.state_dir, &self.document_path::<D>(), document).await
    }

    /// Write one sync report file. Returns its path.
    pub async fn write_report<T: Serialize>(&self, file_stem: &str, report: &T) -> Result<PathBuf> {
        let path = self.reports_dir.join(format!("{}.json", file_stem));
        write_json(&self.reports_dir, &path, report).await?;
        Ok(path)
    }

    /// List report files, oldest first by name.
    pub async fn list_reports(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.reports_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
            Err(e) => {
                return Err(OrchestratorError::Persistence(format!(
                    "failed to read reports dir: {}",
                    e
                )))
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            OrchestratorError::Persistence(format!("failed to read report entry: {}", e))
        })? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Newest parseable report, if any.
    pub async fn latest_report<T: DeserializeOwned>(&self) -> Option<T> {
        let paths = self.list_reports().await.ok()?;
        for path in paths.iter().rev() {
            if let Ok(content) = tokio::fs::read_to_string(path).await {
                if let Ok(report) = serde_json::from_str(&content) {
                    return Some(report);
                }
            }
        }
        None
    }
}

async fn write_json<T: Serialize>(dir: &Path, path: &Path, value: &T) -> Result<()> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        OrchestratorError::Persistence(format!("failed to create {}: {}", dir.display(), e))
    })?;

    let content = serde_json::to_string_pretty(value)
        .map_err(|e| OrchestratorError::Persistence(format!("failed to serialize: {}", e)))?;

    let tmp = path.with_extension(format!("json.tmp-{:08x}", rand::random::<u32>()));
    tokio::fs::write(&tmp, content).await.map_err(|e| {
        OrchestratorError::Persistence(format!("failed to write {}: {}", tmp.display(), e))
    })?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        OrchestratorError::Persistence(format!("failed to replace {}: {}", path.display(), e))
    })?;

    Ok(())
}
