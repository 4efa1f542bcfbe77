use std::{fmt, sync::Arc};

use async_trait::async_trait;
use kaldb_config::upstream_log::{UpstreamLogConfig, UpstreamLogMode};
use kaldb_types::{LogEntry, Offset, Partition};

use crate::memory::MemoryEventLog;

/// Errors during [`EventLog`] operations.
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("unknown topic or partition: {topic}/{partition}")]
    UnknownPartition { topic: String, partition: Partition },
    #[error("upstream log unavailable: {0}")]
    Unavailable(Box<dyn std::error::Error + Send + Sync>),
}

/// Read-side adapter over one upstream partitioned event log.
///
/// Offsets are monotonically increasing but not necessarily contiguous
/// (compacted topics are allowed).
#[async_trait]
pub trait EventLog: 'static + fmt::Debug + Send + Sync {
    /// Earliest offset still retained by the upstream for the partition.
    async fn earliest_offset(
        &self,
        topic: &str,
        partition: Partition,
    ) -> Result<Offset, EventLogError>;

    /// Offset of the last produced record, inclusive. One less than the
    /// earliest offset when the partition holds no records.
    async fn latest_offset(
        &self,
        topic: &str,
        partition: Partition,
    ) -> Result<Offset, EventLogError>;

    /// Fetches up to `max_records` records with offsets `>= from_offset`,
    /// in offset order. An empty result means the end of the log.
    async fn fetch(
        &self,
        topic: &str,
        partition: Partition,
        from_offset: Offset,
        max_records: usize,
    ) -> Result<Vec<LogEntry>, EventLogError>;
}

#[async_trait]
impl<T: EventLog + ?Sized> EventLog for Arc<T> {
    async fn earliest_offset(
        &self,
        topic: &str,
        partition: Partition,
    ) -> Result<Offset, EventLogError> {
        (**self).earliest_offset(topic, partition).await
    }

    async fn latest_offset(
        &self,
        topic: &str,
        partition: Partition,
    ) -> Result<Offset, EventLogError> {
        (**self).latest_offset(topic, partition).await
    }

    async fn fetch(
        &self,
        topic: &str,
        partition: Partition,
        from_offset: Offset,
        max_records: usize,
    ) -> Result<Vec<LogEntry>, EventLogError> {
        (**self)
            .fetch(topic, partition, from_offset, max_records)
            .await
    }
}

/// Seekable consumer over one partition. Tracks its own position; each
/// [`Self::poll()`] resumes where the previous one stopped.
#[derive(Debug)]
pub struct LogConsumer {
    log: Arc<dyn EventLog>,
    topic: String,
    partition: Partition,
    position: Offset,
    max_poll_records: usize,
}

impl LogConsumer {
    pub fn new(
        log: Arc<dyn EventLog>,
        topic: impl Into<String>,
        partition: Partition,
        start_offset: Offset,
        max_poll_records: usize,
    ) -> Self {
        Self {
            log,
            topic: topic.into(),
            partition,
            position: start_offset,
            max_poll_records,
        }
    }

    /// Next batch of records in offset order; empty once the log is drained.
    pub async fn poll(&mut self) -> Result<Vec<LogEntry>, EventLogError> {
        let entries = self
            .log
            .fetch(
                &self.topic,
                self.partition,
                self.position,
                self.max_poll_records,
            )
            .await?;
        if let Some(last) = entries.last() {
            self.position = last.offset.next();
        }
        Ok(entries)
    }

    /// Offset the next poll will start from.
    pub fn position(&self) -> Offset {
        self.position
    }
}

#[derive(Debug)]
enum EventLogOrigin {
    Config(UpstreamLogConfig),
    Mock(Arc<MemoryEventLog>),
}

/// Factory of [`EventLog`]s.
#[derive(Debug)]
pub struct EventLogFactory {
    origin: EventLogOrigin,
}

impl EventLogFactory {
    /// Creates an event log factory based on the provided `config`.
    pub fn new(config: UpstreamLogConfig) -> Self {
        Self {
            origin: EventLogOrigin::Config(config),
        }
    }

    /// Creates a factory with a mock in-memory log. All calls to
    /// [`Self::create_log()`] return the same log, so tests can produce
    /// records through it and read them through the adapter.
    pub fn mock() -> Self {
        Self {
            origin: EventLogOrigin::Mock(Arc::new(MemoryEventLog::default())),
        }
    }

    /// Creates an [`EventLog`].
    pub fn create_log(&self) -> Arc<dyn EventLog> {
        match &self.origin {
            EventLogOrigin::Config(config) => match config.mode {
                UpstreamLogMode::InMemory => {
                    kaldb_logs::info!("Initialized InMemory event log");
                    Arc::new(MemoryEventLog::default())
                }
            },
            EventLogOrigin::Mock(log) => Arc::new(Arc::clone(log)),
        }
    }
}
