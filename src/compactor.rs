use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::observability::WAL_COMPACTIONS_TOTAL;
use crate::store::MemoryStore;

/// Background task that compacts the WAL once `threshold` appends have piled up.
pub async fn run_compactor(store: Arc<MemoryStore>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        compact_if_needed(&store, threshold).await;
    }
}

/// Returns whether a compaction ran successfully.
pub async fn compact_if_needed(store: &MemoryStore, threshold: u64) -> bool {
    if threshold == 0 || !store.is_durable() {
        return false;
    }
    let appends = store.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match store.compact_wal().await {
        Ok(()) => {
            metrics::counter!(WAL_COMPACTIONS_TOTAL, "status" => "ok").increment(1);
            info!("compacted WAL after {appends} appends");
            true
        }
        Err(e) => {
            metrics::counter!(WAL_COMPACTIONS_TOTAL, "status" => "error").increment(1);
            warn!("WAL compaction failed: {e}");
            false
        }
    }
}
