//! Sync runs and scheduler behaviour through the public API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use campaign_orchestrator::config::ProviderConfig;
use campaign_orchestrator::{
    BackupManager, HealthProbe, HealthVerifier, OverlapPolicy, ProviderBackend, Result,
    Schedule, Scheduler, StateStore, SyncBackend, SyncOrchestrator, SyncReport, SyncStats,
};

/// Provider that takes `latency` per call and keeps documents in memory.
#[derive(Default)]
struct SlowProvider {
    latency: Duration,
    documents: Mutex<HashMap<String, Value>>,
}

#[async_trait]
impl SyncBackend for SlowProvider {
    async fn sync_payments(&self) -> Result<Value> {
        tokio::time::sleep(self.latency).await;
        Ok(json!({ "synced": 1 }))
    }

    async fn fetch_analytics(&self) -> Result<Value> {
        tokio::time::sleep(self.latency).await;
        Ok(json!({ "visitors": 42 }))
    }

    async fn read_document(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.documents.lock().get(name).cloned())
    }

    async fn write_document(&self, name: &str, document: &Value) -> Result<()> {
        self.documents
            .lock()
            .insert(name.to_string(), document.clone());
        Ok(())
    }
}

struct AlwaysHealthy;

impl HealthProbe for AlwaysHealthy {
    async fn probe(&self, _url: &str, _timeout: Duration) -> Result<u16> {
        Ok(200)
    }
}

fn scheduler(
    dir: &std::path::Path,
    provider: SlowProvider,
    sync_every: Duration,
) -> Scheduler<SlowProvider, AlwaysHealthy> {
    let store = StateStore::new(dir.join("state"));
    let sync = Arc::new(SyncOrchestrator::new(provider, store));
    let backups = BackupManager::new(dir, dir.join("backups"), vec!["package.json".into()]);
    let health = HealthVerifier::new(
        AlwaysHealthy,
        3,
        Duration::from_millis(1),
        Duration::from_millis(100),
    );
    Scheduler::new(
        sync,
        backups,
        health,
        None,
        Schedule {
            sync_every,
            backup_every: Duration::from_secs(3600),
            health_every: Duration::from_secs(3600),
            overlap: OverlapPolicy::Allow,
        },
    )
}

#[tokio::test]
async fn overlapping_syncs_each_persist_a_report() {
    let dir = tempfile::tempdir().unwrap();
    let provider = SlowProvider {
        latency: Duration::from_millis(80),
        ..Default::default()
    };
    let mut scheduler = scheduler(dir.path(), provider, Duration::ZERO);

    scheduler.start().unwrap();
    let manual = scheduler.trigger_sync();
    let report = manual.await.unwrap().unwrap();
    assert_eq!(report.summary.successful, 5);

    tokio::time::sleep(Duration::from_millis(200)).await;
    scheduler.stop().await;

    let store = scheduler.sync().store();
    let reports = store.list_reports().await.unwrap();
    assert_eq!(reports.len(), 2);

    let mut timestamps = Vec::new();
    for path in &reports {
        let content = std::fs::read_to_string(path).unwrap();
        let report: SyncReport = serde_json::from_str(&content).unwrap();
        timestamps.push(report.timestamp);
    }
    assert_ne!(timestamps[0], timestamps[1]);

    let stats: SyncStats = store.load().await;
    assert_eq!(stats.total_syncs, 2);
    assert_eq!(stats.successful_syncs, 2);
}

#[tokio::test]
async fn stats_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut first = scheduler(dir.path(), SlowProvider::default(), Duration::from_secs(3600));
        first.initialize().await;
        first.trigger_sync().await.unwrap().unwrap();
        first.stop().await;
    }

    let second = scheduler(dir.path(), SlowProvider::default(), Duration::from_secs(3600));
    second.initialize().await;
    assert_eq!(second.sync().stats().total_syncs, 1);

    second.trigger_sync().await.unwrap().unwrap();
    assert_eq!(second.sync().stats().total_syncs, 2);
}

#[tokio::test]
async fn no_health_target_skips_probe() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = scheduler(dir.path(), SlowProvider::default(), Duration::from_secs(3600));

    let report = scheduler.trigger_health().await.unwrap().unwrap();
    assert!(report.is_none());
}

#[tokio::test]
async fn provider_outage_still_recomputes_local_documents() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(
        data_dir.join("campaigns.json"),
        serde_json::to_string(&json!({
            "campaigns": [
                {"id": "well", "raised": 250, "goal": 1000},
                {"id": "draft", "raised": 10, "goal": 0}
            ]
        }))
        .unwrap(),
    )
    .unwrap();
    std::fs::write(
        data_dir.join("webhook_queue.json"),
        r#"[{"type":"payment_intent.succeeded"}]"#,
    )
    .unwrap();

    let config = ProviderConfig {
        base_url: "http://127.0.0.1:1/api/payments".into(),
        timeout_ms: 500,
        api_key_env: None,
        data_dir: data_dir.clone(),
        ..Default::default()
    };
    let backend = ProviderBackend::from_config(&config).unwrap();
    let sync = SyncOrchestrator::new(backend, StateStore::new(dir.path().join("state")));

    let report = sync.run_full_sync().await.unwrap();

    assert!(!report.results["payments"].success);
    assert!(!report.results["analytics"].success);
    assert!(report.results["campaigns"].success);
    assert!(report.results["donations"].success);
    assert!(report.results["webhooks"].success);

    let campaigns: Value =
        serde_json::from_str(&std::fs::read_to_string(data_dir.join("campaigns.json")).unwrap())
            .unwrap();
    assert_eq!(campaigns["campaigns"][0]["progress_percentage"], "25.0");
    assert!(campaigns["campaigns"][1].get("progress_percentage").is_none());

    let queue = std::fs::read_to_string(data_dir.join("webhook_queue.json")).unwrap();
    assert_eq!(serde_json::from_str::<Value>(&queue).unwrap(), json!([]));

    // Sub-sync failures don't make the run a failure.
    let stats = sync.stats();
    assert_eq!(stats.successful_syncs, 1);
    assert_eq!(stats.errors, 0);
}
