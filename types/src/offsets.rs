use kaldb_basic_types::Offset;
use serde::{Deserialize, Serialize};

/// A validated, clamped offset range to recover. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionOffsets {
    pub start_offset: Offset,
    pub end_offset: Offset,
}

impl PartitionOffsets {
    pub fn new(start_offset: Offset, end_offset: Offset) -> Self {
        Self {
            start_offset,
            end_offset,
        }
    }
}
