use serde::{Deserialize, Serialize};

/// Maps a dataset's time range to the upstream partitions that carried it.
/// Written by operator tooling; the core only reads it for query routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetPartitionMetadata {
    pub name: String,
    pub start_time_epoch_ms: i64,
    pub end_time_epoch_ms: i64,
    pub partitions: Vec<String>,
}

impl DatasetPartitionMetadata {
    pub fn contains_time(&self, epoch_ms: i64) -> bool {
        self.start_time_epoch_ms <= epoch_ms && epoch_ms <= self.end_time_epoch_ms
    }
}

/// Partition ids of every dataset entry whose time range intersects
/// `[start_ms, end_ms]`, deduplicated, in first-seen order.
pub fn partitions_for_range(
    entries: &[DatasetPartitionMetadata],
    start_ms: i64,
    end_ms: i64,
) -> Vec<String> {
    let mut partitions = Vec::new();
    for entry in entries {
        if entry.start_time_epoch_ms <= end_ms && entry.end_time_epoch_ms >= start_ms {
            for partition in &entry.partitions {
                if !partitions.contains(partition) {
                    partitions.push(partition.clone());
                }
            }
        }
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, start: i64, end: i64, partitions: &[&str]) -> DatasetPartitionMetadata {
        DatasetPartitionMetadata {
            name: name.to_string(),
            start_time_epoch_ms: start,
            end_time_epoch_ms: end,
            partitions: partitions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn range_lookup_merges_overlapping_entries() {
        let entries = vec![
            entry("logs", 0, 100, &["0", "1"]),
            entry("logs", 101, 200, &["1", "2"]),
            entry("logs", 201, 300, &["3"]),
        ];
        assert_eq!(partitions_for_range(&entries, 50, 150), vec!["0", "1", "2"]);
        assert_eq!(partitions_for_range(&entries, 250, 400), vec!["3"]);
        assert!(partitions_for_range(&entries, 400, 500).is_empty());
    }
}
