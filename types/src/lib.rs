pub use kaldb_basic_types::*;

pub use chunk::ChunkMetadata;
pub use dataset::DatasetPartitionMetadata;
pub use message::{LogDocument, LogEntry};
pub use offsets::PartitionOffsets;
pub use recovery::{RecoveryNode, RecoveryNodeState, RecoveryTask};
pub use snapshot::Snapshot;

pub mod chunk;
pub mod dataset;
pub mod message;
pub mod offsets;
pub mod recovery;
pub mod snapshot;
