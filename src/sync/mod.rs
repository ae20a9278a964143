//! Full sync between the payment provider and local documents.
//!
//! A run fans out to five independent sub-syncs, collects every outcome
//! into a [`SyncReport`], persists the report and updates [`SyncStats`].
//! Sub-sync failures are reported, never escalated: a run only counts
//! as failed when its report can't be written.

mod campaign;
mod fanout;
mod report;

pub use campaign::{
    recompute_all, recompute_progress, summarize_donations, DonationSummary, RecomputeSummary,
};
pub use fanout::{collect_all, SubSync};
pub use report::{unique_timestamp, SubSyncResult, SyncReport, SyncSummary};

use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::backend::SyncBackend;
use crate::error::{OrchestratorError, Result};
use crate::store::{StateStore, SyncStats};

pub const CAMPAIGNS_DOCUMENT: &str = "campaigns";
pub const DONATIONS_DOCUMENT: &str = "donations";
pub const DONATION_SUMMARY_DOCUMENT: &str = "donation_summary";
pub const ANALYTICS_DOCUMENT: &str = "analytics";
pub const WEBHOOK_QUEUE_DOCUMENT: &str = "webhook_queue";

pub struct SyncOrchestrator<B: SyncBackend> {
    backend: B,
    store: StateStore,
    stats: Mutex<SyncStats>,
}

impl<B: SyncBackend> SyncOrchestrator<B> {
    /// Orchestrator with fresh statistics. Call [`initialize`](Self::initialize)
    /// to pick up persisted ones.
    pub fn new(backend: B, store: StateStore) -> Self {
        Self {
            backend,
            store,
            stats: Mutex::new(SyncStats::default()),
        }
    }

    /// Orchestrator with statistics loaded from the store.
    pub async fn load(backend: B, store: StateStore) -> Self {
        let orchestrator = Self::new(backend, store);
        orchestrator.initialize().await;
        orchestrator
    }

    /// Replace in-memory statistics with the persisted ones.
    pub async fn initialize(&self) {
        let stats: SyncStats = self.store.load().await;
        info!(
            total_syncs = stats.total_syncs,
            successful_syncs = stats.successful_syncs,
            "loaded sync statistics"
        );
        *self.stats.lock() = stats;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.lock().clone()
    }

    pub async fn persist_stats(&self) {
        let snapshot = self.stats();
        self.store.save(&snapshot).await;
    }

    /// Run all sub-syncs and persist the report.
    ///
    /// Statistics are persisted whatever the outcome. The error case is
    /// a report that couldn't be written.
    pub async fn run_full_sync(&self) -> Result<SyncReport> {
        let timestamp = unique_timestamp();
        let started = Instant::now();
        self.stats.lock().record_attempt();
        info!(%timestamp, "starting full sync");

        let results = collect_all(vec![
            ("payments", self.backend.sync_payments()),
            ("campaigns", self.recompute_campaigns().boxed()),
            ("donations", self.refresh_donations().boxed()),
            ("analytics", self.refresh_analytics().boxed()),
            ("webhooks", self.drain_webhooks().boxed()),
        ])
        .await;

        let report = SyncReport::new(timestamp, started.elapsed().as_millis() as u64, results);
        let written = self.store.write_report(&report.file_stem(), &report).await;

        match &written {
            Ok(path) => {
                self.stats.lock().record_success(Utc::now());
                info!(
                    successful = report.summary.successful,
                    failed = report.summary.failed,
                    duration_ms = report.duration_ms,
                    report = %path.display(),
                    "full sync finished"
                );
            }
            Err(e) => {
                self.stats.lock().record_failure(e.to_string());
                error!(error = %e, "full sync failed");
            }
        }

        self.persist_stats().await;
        written.map(|_| report)
    }

    // ═══════════════════════════════════════════════════════════════
    // SUB-SYNCS
    // ═══════════════════════════════════════════════════════════════

    async fn recompute_campaigns(&self) -> Result<Value> {
        let Some(mut document) = self.backend.read_document(CAMPAIGNS_DOCUMENT).await? else {
            return Ok(json!(RecomputeSummary::default()));
        };

        let records = campaign::records_mut(&mut document, CAMPAIGNS_DOCUMENT).ok_or_else(|| {
            OrchestratorError::InvalidState("campaigns document is not a list".into())
        })?;
        let summary = recompute_all(records, Utc::now());

        self.backend
            .write_document(CAMPAIGNS_DOCUMENT, &document)
            .await?;
        Ok(json!(summary))
    }

    async fn refresh_donations(&self) -> Result<Value> {
        let mut document = self
            .backend
            .read_document(DONATIONS_DOCUMENT)
            .await?
            .unwrap_or_else(|| json!([]));

        let donations = campaign::records_mut(&mut document, DONATIONS_DOCUMENT).ok_or_else(|| {
            OrchestratorError::InvalidState("donations document is not a list".into())
        })?;
        let summary = summarize_donations(donations, Utc::now());
        let summary = serde_json::to_value(&summary).map_err(|e| {
            OrchestratorError::Persistence(format!("failed to serialize donation summary: {}", e))
        })?;

        self.backend
            .write_document(DONATION_SUMMARY_DOCUMENT, &summary)
            .await?;
        Ok(json!({
            "donationCount": summary["donation_count"],
            "totalAmount": summary["total_amount"],
        }))
    }

    async fn refresh_analytics(&self) -> Result<Value> {
        let analytics = self.backend.fetch_analytics().await?;
        let document = json!({
            "fetched_at": Utc::now().to_rfc3339(),
            "data": analytics,
        });
        self.backend
            .write_document(ANALYTICS_DOCUMENT, &document)
            .await?;
        Ok(analytics)
    }

    async fn drain_webhooks(&self) -> Result<Value> {
        let queued = match self.backend.read_document(WEBHOOK_QUEUE_DOCUMENT).await? {
            None => 0,
            Some(Value::Array(events)) => events.len(),
            Some(_) => {
                return Err(OrchestratorError::InvalidState(
                    "webhook queue is not a list".into(),
                ))
            }
        };

        if queued > 0 {
            self.backend
                .write_document(WEBHOOK_QUEUE_DOCUMENT, &json!([]))
                .await?;
        }
        Ok(json!({ "drained": queued }))
    }
}
