use std::{
    collections::HashMap,
    sync::Mutex,
};

use async_trait::async_trait;
use kaldb_types::{LogEntry, Offset, Partition};

use crate::raw::{EventLog, EventLogError};

#[derive(Debug, Default)]
struct PartitionLog {
    /// Retained records in offset order.
    entries: Vec<LogEntry>,
    /// Earliest offset still retained; advanced by truncation.
    log_start_offset: Offset,
    /// Offset the next produced record receives.
    next_offset: Offset,
}

/// In-memory partitioned [`EventLog`] with a producer side, for tests and
/// single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    partitions: Mutex<HashMap<(String, Partition), PartitionLog>>,
}

impl MemoryEventLog {
    /// Appends a record, assigning it the next offset. Returns the offset.
    pub fn append(
        &self,
        topic: &str,
        partition: Partition,
        timestamp_ms: i64,
        payload: Vec<u8>,
    ) -> Offset {
        let mut partitions = self.partitions.lock().unwrap();
        let partition_log = partitions
            .entry((topic.to_owned(), partition))
            .or_default();
        let offset = partition_log.next_offset;
        partition_log
            .entries
            .push(LogEntry::new(offset, timestamp_ms, payload));
        partition_log.next_offset = offset.next();
        offset
    }

    /// Appends a record at an explicit offset, which must exceed every offset
    /// already present. Models compacted topics with offset gaps.
    pub fn append_at(
        &self,
        topic: &str,
        partition: Partition,
        offset: Offset,
        timestamp_ms: i64,
        payload: Vec<u8>,
    ) {
        let mut partitions = self.partitions.lock().unwrap();
        let partition_log = partitions
            .entry((topic.to_owned(), partition))
            .or_default();
        assert!(
            offset >= partition_log.next_offset,
            "offset {offset} is not past the log head {}",
            partition_log.next_offset
        );
        partition_log
            .entries
            .push(LogEntry::new(offset, timestamp_ms, payload));
        partition_log.next_offset = offset.next();
    }

    /// Drops retained records with offsets below `offset`, emulating upstream
    /// retention aging data out.
    pub fn truncate_before(&self, topic: &str, partition: Partition, offset: Offset) {
        let mut partitions = self.partitions.lock().unwrap();
        if let Some(partition_log) = partitions.get_mut(&(topic.to_owned(), partition)) {
            partition_log.entries.retain(|entry| entry.offset >= offset);
            if offset > partition_log.log_start_offset {
                partition_log.log_start_offset = offset;
            }
        }
    }

    fn with_partition<T>(
        &self,
        topic: &str,
        partition: Partition,
        f: impl FnOnce(&PartitionLog) -> T,
    ) -> Result<T, EventLogError> {
        let partitions = self.partitions.lock().unwrap();
        partitions
            .get(&(topic.to_owned(), partition))
            .map(f)
            .ok_or_else(|| EventLogError::UnknownPartition {
                topic: topic.to_owned(),
                partition,
            })
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn earliest_offset(
        &self,
        topic: &str,
        partition: Partition,
    ) -> Result<Offset, EventLogError> {
        self.with_partition(topic, partition, |log| {
            log.entries
                .first()
                .map(|entry| entry.offset)
                .unwrap_or(log.log_start_offset)
        })
    }

    async fn latest_offset(
        &self,
        topic: &str,
        partition: Partition,
    ) -> Result<Offset, EventLogError> {
        self.with_partition(topic, partition, |log| log.next_offset - 1)
    }

    async fn fetch(
        &self,
        topic: &str,
        partition: Partition,
        from_offset: Offset,
        max_records: usize,
    ) -> Result<Vec<LogEntry>, EventLogError> {
        self.with_partition(topic, partition, |log| {
            let start = log
                .entries
                .partition_point(|entry| entry.offset < from_offset);
            log.entries[start..]
                .iter()
                .take(max_records)
                .cloned()
                .collect()
        })
    }
}
