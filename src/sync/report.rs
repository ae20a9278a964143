//! Sync run reports.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Outcome of one sub-sync: `{success, data}` or `{success: false, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubSyncResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubSyncResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn from_result(result: Result<Value>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
}

/// One report per sync run. Reports accumulate; nothing prunes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub results: BTreeMap<String, SubSyncResult>,
    pub summary: SyncSummary,
}

impl SyncReport {
    pub fn new<I>(timestamp: DateTime<Utc>, duration_ms: u64, results: I) -> Self
    where
        I: IntoIterator<Item = (String, SubSyncResult)>,
    {
        let results: BTreeMap<_, _> = results.into_iter().collect();
        let successful = results.values().filter(|r| r.success).count();
        let summary = SyncSummary {
            successful,
            failed: results.len() - successful,
            total: results.len(),
        };
        Self {
            timestamp,
            duration_ms,
            results,
            summary,
        }
    }

    /// File stem, sortable by time.
    pub fn file_stem(&self) -> String {
        format!(
            "sync-report-{}",
            self.timestamp.format("%Y%m%dT%H%M%S%.9fZ")
        )
    }
}

static LAST_STAMP_NANOS: AtomicI64 = AtomicI64::new(0);

/// Current time, strictly increasing within the process.
///
/// Concurrent sync runs key their reports by timestamp, so two runs
/// must never observe the same instant.
pub fn unique_timestamp() -> DateTime<Utc> {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX - 1);
    let previous = LAST_STAMP_NANOS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    Utc.timestamp_nanos(now.max(previous + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use serde_json::json;

    #[test]
    fn test_summary_counts() {
        let report = SyncReport::new(
            Utc::now(),
            12,
            vec![
                ("payments".to_string(), SubSyncResult::ok(json!({"synced": 1}))),
                ("campaigns".to_string(), SubSyncResult::failed("no data")),
                ("webhooks".to_string(), SubSyncResult::ok(json!({"drained": 0}))),
            ],
        );
        assert_eq!(
            report.summary,
            SyncSummary {
                successful: 2,
                failed: 1,
                total: 3
            }
        );
    }

    #[test]
    fn test_sub_sync_json_shape() {
        let ok = serde_json::to_value(SubSyncResult::ok(json!(5))).unwrap();
        assert_eq!(ok, json!({"success": true, "data": 5}));

        let failed = SubSyncResult::from_result(Err(OrchestratorError::TransientNetwork(
            "502".into(),
        )));
        let failed = serde_json::to_value(failed).unwrap();
        assert_eq!(failed, json!({"success": false, "error": "network error: 502"}));
    }

    #[test]
    fn test_unique_timestamps_strictly_increase() {
        let stamps: Vec<_> = (0..1000).map(|_| unique_timestamp()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_file_stems_sort_chronologically() {
        let a = SyncReport::new(unique_timestamp(), 0, Vec::new());
        let b = SyncReport::new(unique_timestamp(), 0, Vec::new());
        assert!(a.file_stem() < b.file_stem());
        assert!(a.file_stem().starts_with("sync-report-"));
    }
}
