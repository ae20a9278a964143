//! Command-line plumbing shared by the `campaign-automation` and
//! `campaign-deploy` binaries.
//!
//! - `AutomationCli`, `DeployCli`: argument definitions via clap
//! - `Display`: terminal output
//! - `StopSignal`: stop-request marker for a running scheduler

mod commands;
mod display;

pub use commands::{AutomationCli, AutomationCommand, DeployCli};
pub use display::Display;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{OrchestratorConfig, CONFIG_FILE};
use crate::error::Result;

pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("campaign_orchestrator=debug")
    } else {
        EnvFilter::new("campaign_orchestrator=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

/// Load `path`, or `./orchestrator.toml` when none is given.
pub async fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    debug!(path = %path.display(), "loading configuration");
    OrchestratorConfig::load(&path).await
}

/// Marker file asking a running scheduler process to shut down.
#[derive(Debug, Clone)]
pub struct StopSignal {
    path: PathBuf,
}

impl StopSignal {
    pub const FILE_NAME: &'static str = "stop-requested";

    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn request(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, chrono::Utc::now().to_rfc3339()).await?;
        info!(marker = %self.path.display(), "stop requested");
        Ok(())
    }

    pub async fn is_requested(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Remove the marker. Returns whether one was present.
    pub async fn clear(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve once the marker appears, consuming it.
    pub async fn wait(&self, poll: Duration) {
        let mut ticker = tokio::time::interval(poll);
        loop {
            ticker.tick().await;
            if self.is_requested().await {
                let _ = self.clear().await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_signal_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let signal = StopSignal::new(&dir.path().join("state"));

        assert!(!signal.is_requested().await);
        assert!(!signal.clear().await.unwrap());

        signal.request().await.unwrap();
        assert!(signal.is_requested().await);

        tokio::time::timeout(Duration::from_secs(1), signal.wait(Duration::from_millis(5)))
            .await
            .unwrap();
        assert!(!signal.is_requested().await);
    }

    #[tokio::test]
    async fn test_wait_picks_up_later_request() {
        let dir = tempfile::tempdir().unwrap();
        let signal = StopSignal::new(dir.path());
        let requester = signal.clone();

        let waiter = tokio::spawn(async move { signal.wait(Duration::from_millis(5)).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());

        requester.request().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_load_config_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml")))
            .await
            .unwrap();
        assert_eq!(config.schedule.sync_interval_secs, 300);
    }
}
