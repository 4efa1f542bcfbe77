use std::{sync::Arc, time::Duration};

use futures::stream;
use kaldb_chunk::{ChunkBuildError, ChunkBuilder};
use kaldb_event_log::{EventLog, EventLogError, LogConsumer};
use kaldb_metadata_store::{MetadataStoreError, SnapshotStore};
use kaldb_types::{LogEntry, Offset, Partition, RecoveryTask, Snapshot};
use tokio::time::timeout;

use super::offset_validator::validate_offsets;

#[derive(Debug, thiserror::Error)]
enum TaskError {
    #[error("recovery task names an unparsable partition: {0}")]
    InvalidPartition(String),
    #[error("upstream log error: {0}")]
    Upstream(#[from] EventLogError),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("offset range [{0}, {1}] is not recoverable")]
    Unrecoverable(Offset, Offset),
    #[error(transparent)]
    Build(#[from] ChunkBuildError),
    #[error("failed to publish snapshot: {0}")]
    Publish(#[from] MetadataStoreError),
}

impl TaskError {
    /// Whether the failure happened outside the chunk builder; the builder
    /// counts its own failed rollovers.
    fn counts_as_failed_rollover(&self) -> bool {
        !matches!(self, Self::Build(_) | Self::Publish(_))
    }
}

/// Executes one recovery task end to end: validate the offset range against
/// what the upstream still retains, drain the clamped range, build and upload
/// a chunk, publish the snapshot.
#[derive(Debug)]
pub struct RecoveryTaskRunner {
    event_log: Arc<dyn EventLog>,
    chunk_builder: ChunkBuilder,
    snapshot_store: SnapshotStore,
    topic: String,
    max_poll_records: usize,
    operation_timeout: Duration,
}

impl RecoveryTaskRunner {
    pub fn new(
        event_log: Arc<dyn EventLog>,
        chunk_builder: ChunkBuilder,
        snapshot_store: SnapshotStore,
        topic: impl Into<String>,
        max_poll_records: usize,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            event_log,
            chunk_builder,
            snapshot_store,
            topic: topic.into(),
            max_poll_records,
            operation_timeout,
        }
    }

    /// Returns `true` iff a snapshot was published for the task. Failures are
    /// logged and reported through the rollover counters; the task record is
    /// never touched here.
    pub async fn handle_recovery_task(&self, task: &RecoveryTask) -> bool {
        match self.run(task).await {
            Ok(snapshot) => {
                kaldb_logs::info!(
                    "Recovery task {} published snapshot {} covering offsets up to {}",
                    task.name,
                    snapshot.name,
                    snapshot.max_offset
                );
                true
            }
            Err(err) => {
                if err.counts_as_failed_rollover() {
                    self.chunk_builder.metrics().record_rollover_failed();
                }
                kaldb_logs::error!("Recovery task {} failed: {err}", task.name);
                false
            }
        }
    }

    async fn run(&self, task: &RecoveryTask) -> Result<Snapshot, TaskError> {
        let partition: Partition = task
            .partition_id
            .parse()
            .map_err(|_| TaskError::InvalidPartition(task.partition_id.clone()))?;

        let earliest = self
            .with_timeout(self.event_log.earliest_offset(&self.topic, partition))
            .await??;
        let latest = self
            .with_timeout(self.event_log.latest_offset(&self.topic, partition))
            .await??;
        if latest < earliest {
            // The partition holds no retained records at all.
            return Err(TaskError::Unrecoverable(task.start_offset, task.end_offset));
        }

        let offsets = validate_offsets(earliest, latest, task.start_offset, task.end_offset)
            .ok_or(TaskError::Unrecoverable(task.start_offset, task.end_offset))?;
        if offsets.start_offset != task.start_offset || offsets.end_offset != task.end_offset {
            kaldb_logs::warn!(
                "Recovery task {} range [{}, {}] clamped to retained [{}, {}]",
                task.name,
                task.start_offset,
                task.end_offset,
                offsets.start_offset,
                offsets.end_offset
            );
        }

        let entries = self.drain_range(partition, offsets.start_offset, offsets.end_offset).await?;
        let snapshot = self
            .with_timeout(
                self.chunk_builder
                    .build(&task.partition_id, stream::iter(entries)),
            )
            .await??;

        self.snapshot_store.create(&snapshot).await?;
        Ok(snapshot)
    }

    /// Drains `[start, end]` in offset order, stopping once the next
    /// delivered offset would exceed `end`.
    async fn drain_range(
        &self,
        partition: Partition,
        start: Offset,
        end: Offset,
    ) -> Result<Vec<LogEntry>, TaskError> {
        let mut consumer = LogConsumer::new(
            Arc::clone(&self.event_log),
            &self.topic,
            partition,
            start,
            self.max_poll_records,
        );
        let mut entries = Vec::new();
        loop {
            let batch = self.with_timeout(consumer.poll()).await??;
            if batch.is_empty() {
                return Ok(entries);
            }
            for entry in batch {
                if entry.offset > end {
                    return Ok(entries);
                }
                entries.push(entry);
            }
        }
    }

    async fn with_timeout<T>(
        &self,
        operation: impl std::future::Future<Output = T>,
    ) -> Result<T, TaskError> {
        timeout(self.operation_timeout, operation)
            .await
            .map_err(|_| TaskError::Timeout(self.operation_timeout))
    }
}
