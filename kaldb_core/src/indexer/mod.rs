//! Live indexer for one upstream partition: consumes the log, rolls chunks
//! over by message count, and hands ranges it cannot catch up on to the
//! recovery subsystem.

use std::{mem, sync::Arc, time::Duration};

use anyhow::Context as _;
use futures::stream;
use kaldb_chunk::ChunkBuilder;
use kaldb_event_log::{EventLog, LogConsumer};
use kaldb_health_check::{HealthStatus, HealthUpdater, ReactiveHealthCheck};
use kaldb_metadata_store::{RecoveryTaskStore, SnapshotStore};
use kaldb_types::{LogEntry, Offset, Partition, RecoveryTask};
use kaldb_utils::time::millis_since_epoch;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug)]
pub struct IndexerService {
    partition_id: String,
    topic: String,
    event_log: Arc<dyn EventLog>,
    chunk_builder: ChunkBuilder,
    snapshot_store: SnapshotStore,
    task_store: RecoveryTaskStore,
    max_offset_delay_messages: u64,
    max_messages_per_chunk: u64,
    max_poll_records: usize,
    poll_timeout: Duration,
    health_updater: HealthUpdater,
    health: ReactiveHealthCheck,
}

impl IndexerService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        partition_id: impl Into<String>,
        topic: impl Into<String>,
        event_log: Arc<dyn EventLog>,
        chunk_builder: ChunkBuilder,
        snapshot_store: SnapshotStore,
        task_store: RecoveryTaskStore,
        max_offset_delay_messages: u64,
        max_messages_per_chunk: u64,
        max_poll_records: usize,
        poll_timeout: Duration,
    ) -> Self {
        let (health, health_updater) = ReactiveHealthCheck::new("indexer");
        Self {
            partition_id: partition_id.into(),
            topic: topic.into(),
            event_log,
            chunk_builder,
            snapshot_store,
            task_store,
            max_offset_delay_messages,
            max_messages_per_chunk,
            max_poll_records,
            poll_timeout,
            health_updater,
            health,
        }
    }

    pub fn health_check(&self) -> ReactiveHealthCheck {
        self.health.clone()
    }

    pub async fn run(self, mut stop_receiver: watch::Receiver<bool>) -> anyhow::Result<()> {
        let partition: Partition = self
            .partition_id
            .parse()
            .with_context(|| format!("invalid partition id {:?}", self.partition_id))?;
        let start_offset = self.determine_start_offset(partition).await?;
        kaldb_logs::info!(
            "Indexer for partition {} starts consuming at offset {start_offset}",
            self.partition_id
        );
        self.health_updater.update(HealthStatus::Ready.into());

        let mut consumer = LogConsumer::new(
            Arc::clone(&self.event_log),
            &self.topic,
            partition,
            start_offset,
            self.max_poll_records,
        );
        let mut buffer: Vec<LogEntry> = Vec::new();
        loop {
            if *stop_receiver.borrow() {
                kaldb_logs::info!(
                    "Stop signal received, indexer for partition {} is shutting down",
                    self.partition_id
                );
                break;
            }
            match consumer.poll().await {
                Ok(batch) if batch.is_empty() => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_timeout) => {}
                        changed = stop_receiver.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
                Ok(batch) => {
                    buffer.extend(batch);
                    while buffer.len() as u64 >= self.max_messages_per_chunk {
                        let tail = buffer.split_off(self.max_messages_per_chunk as usize);
                        let chunk_entries = mem::replace(&mut buffer, tail);
                        if let Err(mut returned) = self.roll_over(chunk_entries).await {
                            // Put the failed chunk back in front and let the
                            // next cycle retry.
                            returned.append(&mut buffer);
                            buffer = returned;
                            break;
                        }
                    }
                }
                Err(err) => {
                    kaldb_logs::error!(
                        "Polling partition {} failed, backing off: {err}",
                        self.partition_id
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_timeout) => {}
                        changed = stop_receiver.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        // Seal whatever is buffered so a clean shutdown does not redo work.
        if !buffer.is_empty() {
            self.roll_over(buffer).await.ok();
        }
        Ok(())
    }

    /// Picks where live indexing resumes. A fresh partition starts at the
    /// retained earliest offset. When the gap to the head exceeds the
    /// configured delay, the uncovered range becomes a recovery task and the
    /// indexer jumps to the head instead of catching up inline.
    async fn determine_start_offset(&self, partition: Partition) -> anyhow::Result<Offset> {
        let earliest = self.event_log.earliest_offset(&self.topic, partition).await?;
        let latest = self.event_log.latest_offset(&self.topic, partition).await?;
        let indexed = self
            .snapshot_store
            .max_indexed_offset(&self.partition_id)
            .await?;

        let Some(indexed) = indexed else {
            return Ok(earliest);
        };
        let resume = indexed.next().max(earliest);
        if resume > latest {
            return Ok(resume);
        }

        let lag = (latest.0 - resume.0 + 1) as u64;
        if lag <= self.max_offset_delay_messages {
            return Ok(resume);
        }

        let task = RecoveryTask::new(
            format!("recoveryTask_{}_{}", self.partition_id, Uuid::new_v4()),
            &self.partition_id,
            resume,
            latest,
            millis_since_epoch(),
        );
        kaldb_logs::info!(
            "Partition {} is {lag} messages behind (limit {}); created recovery task {} for [{resume}, {latest}]",
            self.partition_id,
            self.max_offset_delay_messages,
            task.name
        );
        self.task_store
            .create(&task)
            .await
            .context("failed to create recovery task")?;
        Ok(latest.next())
    }

    /// Builds a chunk from the given entries and publishes its snapshot.
    /// On failure the entries are handed back for a later retry
    /// (at-least-once; duplicate snapshots are pruned by the cleaner).
    async fn roll_over(&self, entries: Vec<LogEntry>) -> Result<(), Vec<LogEntry>> {
        let count = entries.len();
        match self
            .chunk_builder
            .build(&self.partition_id, stream::iter(entries.clone()))
            .await
        {
            Ok(snapshot) => match self.snapshot_store.create(&snapshot).await {
                Ok(()) => {
                    kaldb_logs::info!(
                        "Indexer rolled over chunk {} with {count} messages",
                        snapshot.name
                    );
                    Ok(())
                }
                Err(err) => {
                    kaldb_logs::error!(
                        "Failed to publish snapshot {}, re-buffering {count} messages: {err}",
                        snapshot.name
                    );
                    Err(entries)
                }
            },
            Err(err) => {
                kaldb_logs::error!(
                    "Chunk roll-over failed for partition {}, re-buffering {count} messages: {err}",
                    self.partition_id
                );
                Err(entries)
            }
        }
    }
}
