//! Campaign Orchestrator Library
//!
//! Deployment pipeline and scheduled synchronization engine for a
//! donation/campaign site.
//!
//! # Design
//!
//! The pipeline and the sync loop are sequencing logic only. Everything
//! they touch in the outside world goes through two traits:
//! [`DeployBackend`] (build, test, publish, revert) and [`SyncBackend`]
//! (payment provider calls and local JSON documents). The crate ships
//! [`CommandBackend`] and [`ProviderBackend`] as the production
//! implementations; tests substitute fakes.
//!
//! # Usage
//!
//! ```ignore
//! use campaign_orchestrator::{
//!     BackupManager, CommandBackend, DeploymentPipeline, Environment, HealthVerifier,
//!     HttpProbe, OrchestratorConfig, PipelineOptions, StateStore,
//! };
//!
//! let config = OrchestratorConfig::load("orchestrator.toml".as_ref()).await?;
//! let backend = CommandBackend::from_config(&config.pipeline.commands);
//! let health = HealthVerifier::from_config(HttpProbe::from_config(&config.health)?, &config.health);
//! let store = StateStore::from_config(&config.state);
//! let backups = BackupManager::from_config(&config);
//!
//! let pipeline = DeploymentPipeline::new(&backend, &health, &store, &backups, &config);
//! let outcome = pipeline.run(Environment::Staging, PipelineOptions::default()).await?;
//! if !outcome.is_success() {
//!     eprintln!("failed: {:?}", outcome.state.errors);
//! }
//! ```

pub mod backend;
pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod process;
pub mod provider;
pub mod rollback;
pub mod runner;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod sync;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod testing;

// Re-export the main types at crate root for convenience
pub use backend::{DeployBackend, SyncBackend};
pub use backup::{BackupManager, BackupManifest};
pub use config::{OrchestratorConfig, OverlapPolicy, TestFailurePolicy};
pub use error::{OrchestratorError, Result};
pub use health::{HealthProbe, HealthReport, HealthVerifier, HttpProbe};
pub use process::CommandBackend;
pub use provider::ProviderBackend;
pub use rollback::RollbackManager;
pub use runner::StepRunner;
pub use scheduler::{Operation, Schedule, Scheduler};
pub use state::{DeploymentState, Step, StepOutcome, StepResult};
pub use store::{DeploymentHistory, DeploymentRecord, StateStore, SyncStats};
pub use sync::{SyncOrchestrator, SyncReport};
pub use types::*;
pub use workflow::{DeploymentPipeline, PipelineOptions, PipelineOutcome};
