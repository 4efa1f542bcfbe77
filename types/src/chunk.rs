use kaldb_basic_types::Offset;
use serde::{Deserialize, Serialize};

/// Record stored beside the index segments inside an uploaded chunk
/// directory, describing the field schema and the covered time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_id: String,
    pub partition_id: String,
    pub start_time_epoch_ms: i64,
    pub end_time_epoch_ms: i64,
    pub max_offset: Offset,
    pub message_count: u64,
    /// Sorted top-level field names observed across the chunk's documents.
    pub fields: Vec<String>,
}
