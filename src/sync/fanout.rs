//! Run independent sub-syncs concurrently and collect every outcome.

use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use tracing::{debug, warn};

use super::report::SubSyncResult;
use crate::error::Result;

pub type SubSync<'a> = (&'static str, BoxFuture<'a, Result<Value>>);

/// Await all sub-syncs. A failure never cancels its siblings.
pub async fn collect_all(tasks: Vec<SubSync<'_>>) -> Vec<(String, SubSyncResult)> {
    let (names, futures): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
    let outcomes = join_all(futures).await;

    names
        .into_iter()
        .zip(outcomes)
        .map(|(name, outcome)| {
            match &outcome {
                Ok(_) => debug!(sub_sync = name, "sub-sync completed"),
                Err(e) => warn!(sub_sync = name, error = %e, "sub-sync failed"),
            }
            (name.to_string(), SubSyncResult::from_result(outcome))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let slow_finished = AtomicBool::new(false);

        let results = collect_all(vec![
            (
                "fails",
                async { Err::<Value, _>(OrchestratorError::Persistence("disk full".into())) }
                    .boxed(),
            ),
            (
                "slow",
                async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    slow_finished.store(true, Ordering::SeqCst);
                    Ok::<_, OrchestratorError>(json!("done"))
                }
                .boxed(),
            ),
        ])
        .await;

        assert!(slow_finished.load(Ordering::SeqCst));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "fails");
        assert!(!results[0].1.success);
        assert_eq!(results[1].1, SubSyncResult::ok(json!("done")));
    }

    #[tokio::test]
    async fn test_empty_fanout() {
        assert!(collect_all(Vec::new()).await.is_empty());
    }
}
