//! Snapshots of critical configuration files.
//!
//! Each backup copies the configured files into
//! `{backups_dir}/{backup id}/` and writes a `backup-manifest.json`
//! listing what was copied (with SHA-256 digests) and what was missing.
//!
//! ```text
//! backups/
//!   backup-20261018T120000.123Z-3fa2c1/
//!     backup-manifest.json
//!     package.json
//!     vercel.json
//! ```

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};

pub const MANIFEST_FILE: &str = "backup-manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackedUpFile {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub directory: PathBuf,
    pub files: Vec<BackedUpFile>,
    /// Configured files that didn't exist at backup time.
    pub missing: Vec<PathBuf>,
}

/// Creates configuration snapshots.
#[derive(Debug, Clone)]
pub struct BackupManager {
    source_root: PathBuf,
    backups_dir: PathBuf,
    files: Vec<PathBuf>,
}

impl BackupManager {
    pub fn new(
        source_root: impl Into<PathBuf>,
        backups_dir: impl Into<PathBuf>,
        files: Vec<PathBuf>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            backups_dir: backups_dir.into(),
            files,
        }
    }

    /// Snapshots of `[backup] files`, read from the command working
    /// directory and written under the state dir's backups folder.
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(
            config.working_dir(),
            config.state.backups_path(),
            config.backup.files.clone(),
        )
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Copy every configured file into a fresh snapshot directory.
    ///
    /// Missing files are listed in the manifest. Any other I/O error
    /// fails the backup, as do two configured files that would land on
    /// the same snapshot path.
    pub async fn create_backup(&self) -> Result<BackupManifest> {
        self.check_collisions()?;

        let timestamp = Utc::now();
        let id = format!(
            "backup-{}-{:06x}",
            timestamp.format("%Y%m%dT%H%M%S%.3fZ"),
            rand::random::<u32>() & 0x00ff_ffff
        );
        let directory = self.backups_dir.join(&id);
        tokio::fs::create_dir_all(&directory).await.map_err(|e| {
            OrchestratorError::step(
                "backup",
                format!("failed to create {}: {}", directory.display(), e),
            )
        })?;

        let mut files = Vec::new();
        let mut missing = Vec::new();

        for file in &self.files {
            let source = self.source_root.join(file);
            let bytes = match tokio::fs::read(&source).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(file = %file.display(), "backup source missing, skipping");
                    missing.push(file.clone());
                    continue;
                }
                Err(e) => {
                    return Err(OrchestratorError::step(
                        "backup",
                        format!("failed to read {}: {}", source.display(), e),
                    ))
                }
            };

            let relative = contained_path(file);
            let dest = directory.join(&relative);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&dest, &bytes).await.map_err(|e| {
                OrchestratorError::step(
                    "backup",
                    format!("failed to write {}: {}", dest.display(), e),
                )
            })?;

            files.push(BackedUpFile {
                path: relative,
                bytes: bytes.len() as u64,
                sha256: format!("{:x}", Sha256::digest(&bytes)),
            });
        }

        let manifest = BackupManifest {
            id,
            timestamp,
            directory: directory.clone(),
            files,
            missing,
        };

        let content = serde_json::to_string_pretty(&manifest)
            .map_err(|e| OrchestratorError::Persistence(format!("manifest: {}", e)))?;
        tokio::fs::write(directory.join(MANIFEST_FILE), content)
            .await
            .map_err(|e| {
                OrchestratorError::step("backup", format!("failed to write manifest: {}", e))
            })?;

        info!(
            backup = %manifest.id,
            files = manifest.files.len(),
            missing = manifest.missing.len(),
            "backup created"
        );
        Ok(manifest)
    }

    fn check_collisions(&self) -> Result<()> {
        let mut seen: HashMap<PathBuf, &Path> = HashMap::new();
        for file in &self.files {
            if let Some(first) = seen.insert(contained_path(file), file) {
                if first != file.as_path() {
                    return Err(OrchestratorError::step(
                        "backup",
                        format!(
                            "{} and {} map to the same snapshot path",
                            first.display(),
                            file.display()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Newest readable manifest, if any.
    pub async fn latest(&self) -> Option<BackupManifest> {
        let mut entries = tokio::fs::read_dir(&self.backups_dir).await.ok()?;
        let mut dirs = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            dirs.push(entry.path());
        }
        dirs.sort();

        for dir in dirs.iter().rev() {
            if let Ok(content) = tokio::fs::read_to_string(dir.join(MANIFEST_FILE)).await {
                if let Ok(manifest) = serde_json::from_str(&content) {
                    return Some(manifest);
                }
            }
        }
        None
    }
}

/// Keep snapshot copies inside the snapshot directory, whatever the
/// configured path looks like (absolute, `..`).
fn contained_path(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn project_with_files(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.unwrap();
            }
            tokio::fs::write(path, content).await.unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_backup_copies_files_and_lists_missing() {
        let project =
            project_with_files(&[("package.json", "{}"), ("config/site.json", "{\"a\":1}")]).await;
        let backups = tempfile::tempdir().unwrap();

        let manager = BackupManager::new(
            project.path(),
            backups.path(),
            vec![
                PathBuf::from("package.json"),
                PathBuf::from("config/site.json"),
                PathBuf::from("vercel.json"),
            ],
        );

        let manifest = manager.create_backup().await.unwrap();
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.missing, vec![PathBuf::from("vercel.json")]);
        assert_eq!(manifest.files[0].bytes, 2);
        assert_eq!(manifest.files[0].sha256.len(), 64);

        let copied = tokio::fs::read_to_string(manifest.directory.join("config/site.json"))
            .await
            .unwrap();
        assert_eq!(copied, "{\"a\":1}");
        assert!(manifest.directory.join(MANIFEST_FILE).exists());
    }

    #[tokio::test]
    async fn test_latest_returns_newest_manifest() {
        let project = project_with_files(&[("package.json", "{}")]).await;
        let backups = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(
            project.path(),
            backups.path(),
            vec![PathBuf::from("package.json")],
        );

        assert!(manager.latest().await.is_none());
        let _first = manager.create_backup().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = manager.create_backup().await.unwrap();

        assert_eq!(manager.latest().await.unwrap().id, second.id);
    }

    #[tokio::test]
    async fn test_unwritable_backup_dir_fails() {
        let project = project_with_files(&[("package.json", "{}")]).await;
        let blocker = project.path().join("blocker");
        tokio::fs::write(&blocker, "").await.unwrap();

        let manager = BackupManager::new(
            project.path(),
            blocker.join("backups"),
            vec![PathBuf::from("package.json")],
        );
        let err = manager.create_backup().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::StepExecution { .. }));
    }

    #[tokio::test]
    async fn test_colliding_snapshot_paths_fail() {
        let project = project_with_files(&[("site/a.json", "inner"), ("a.json", "outer")]).await;
        let backups = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(
            project.path().join("site"),
            backups.path(),
            vec![PathBuf::from("a.json"), PathBuf::from("../a.json")],
        );

        let err = manager.create_backup().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::StepExecution { .. }));
        assert!(err.to_string().contains("same snapshot path"), "{}", err);
        assert!(manager.latest().await.is_none());
    }

    #[tokio::test]
    async fn test_repeated_entry_is_not_a_collision() {
        let project = project_with_files(&[("package.json", "{}")]).await;
        let backups = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(
            project.path(),
            backups.path(),
            vec![PathBuf::from("package.json"), PathBuf::from("package.json")],
        );

        assert!(manager.create_backup().await.is_ok());
    }

    #[test]
    fn test_contained_path_strips_escapes() {
        assert_eq!(
            contained_path(Path::new("/etc/app/site.json")),
            PathBuf::from("etc/app/site.json")
        );
        assert_eq!(
            contained_path(Path::new("../secrets.json")),
            PathBuf::from("secrets.json")
        );
    }
}
