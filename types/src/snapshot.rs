use kaldb_basic_types::Offset;
use serde::{Deserialize, Serialize};

/// Metadata record that makes an uploaded chunk discoverable. Published only
/// after the chunk directory exists on the blob store; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    /// Blob store URI of the chunk directory.
    pub snapshot_path: String,
    pub start_time_epoch_ms: i64,
    pub end_time_epoch_ms: i64,
    /// Last upstream offset covered by the chunk.
    pub max_offset: Offset,
    pub partition_id: String,
    pub size_bytes: u64,
}

impl Snapshot {
    /// Whether the snapshot's time range intersects `[start_ms, end_ms]`.
    pub fn overlaps(&self, start_ms: i64, end_ms: i64) -> bool {
        self.start_time_epoch_ms <= end_ms && self.end_time_epoch_ms >= start_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(start_ms: i64, end_ms: i64) -> Snapshot {
        Snapshot {
            name: "snap".to_string(),
            snapshot_path: "chunks/snap".to_string(),
            start_time_epoch_ms: start_ms,
            end_time_epoch_ms: end_ms,
            max_offset: Offset(100),
            partition_id: "0".to_string(),
            size_bytes: 1024,
        }
    }

    #[test]
    fn overlap_is_inclusive_on_both_bounds() {
        let s = snapshot(1_000, 2_000);
        assert!(s.overlaps(2_000, 3_000));
        assert!(s.overlaps(0, 1_000));
        assert!(!s.overlaps(2_001, 3_000));
        assert!(!s.overlaps(0, 999));
    }
}
