mod builder;
mod metrics;
mod transform;
mod writer;

pub use self::{
    builder::{ChunkBuildError, ChunkBuilder},
    metrics::IndexingMetrics,
    transform::{JsonMessageTransformer, MessageTransformer, TransformError},
    writer::ChunkIndexWriter,
};
