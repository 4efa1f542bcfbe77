use std::{sync::Arc, time::Duration};

use kaldb_metadata_store::SnapshotStore;
use kaldb_object_store::ObjectStore;
use kaldb_utils::time::millis_since_epoch;
use tokio::sync::watch;

/// Prunes snapshots past their configured lifespan: the chunk blobs go
/// first, the registry record second, so a record never points at deleted
/// blobs while the cleaner is mid-flight.
#[derive(Debug)]
pub struct SnapshotCleanerService {
    snapshot_store: SnapshotStore,
    object_store: Arc<dyn ObjectStore>,
    snapshot_lifespan: Duration,
    schedule_period: Duration,
}

impl SnapshotCleanerService {
    pub fn new(
        snapshot_store: SnapshotStore,
        object_store: Arc<dyn ObjectStore>,
        snapshot_lifespan: Duration,
        schedule_period: Duration,
    ) -> Self {
        Self {
            snapshot_store,
            object_store,
            snapshot_lifespan,
            schedule_period,
        }
    }

    pub async fn run(self, mut stop_receiver: watch::Receiver<bool>) -> anyhow::Result<()> {
        loop {
            if *stop_receiver.borrow() {
                kaldb_logs::info!("Stop signal received, snapshot cleaner is shutting down");
                break;
            }
            let cutoff_ms = millis_since_epoch() - self.snapshot_lifespan.as_millis() as i64;
            match self.clean_expired(cutoff_ms).await {
                Ok(0) => {}
                Ok(removed) => kaldb_logs::info!("Pruned {removed} expired snapshots"),
                Err(err) => kaldb_logs::error!("Snapshot cleaning cycle failed: {err}"),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.schedule_period) => {}
                changed = stop_receiver.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Removes every snapshot whose covered range ended before `cutoff_ms`.
    /// Per-snapshot failures are logged and skipped; the next cycle retries.
    pub async fn clean_expired(&self, cutoff_ms: i64) -> anyhow::Result<usize> {
        let snapshots = self.snapshot_store.list().await?;
        let mut removed = 0;
        for snapshot in snapshots {
            if snapshot.end_time_epoch_ms >= cutoff_ms {
                continue;
            }
            let store = self.object_store.as_ref();
            if let Err(err) = store.remove_dir(&snapshot.name).await {
                kaldb_logs::warn!("Failed to remove blobs of snapshot {}: {err}", snapshot.name);
                continue;
            }
            if let Err(err) = self.snapshot_store.delete(&snapshot.name).await {
                kaldb_logs::warn!(
                    "Removed blobs but failed to delete snapshot record {}: {err}",
                    snapshot.name
                );
                continue;
            }
            removed += 1;
        }
        Ok(removed)
    }
}
