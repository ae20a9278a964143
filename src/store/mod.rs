//! Persistence layer for orchestration state.
//!
//! This module contains:
//! - [`StateStore`]: load-or-default / log-on-failure JSON document store
//! - [`Document`]: persisted documents: [`DeploymentHistory`], [`SyncStats`]
//! - [`DeploymentRecord`]: historical snapshot of one pipeline run

mod documents;
mod file_backed;
mod record;

pub use documents::{
    DeploymentHistory, Document, RollbackEntry, RollbackResult, SyncStats, MAX_DEPLOYMENTS,
};
pub use file_backed::StateStore;
pub use record::DeploymentRecord;
