use std::{path::PathBuf, sync::Arc};

use futures::{pin_mut, Stream, StreamExt};
use kaldb_object_store::{BlobIoError, ObjectStore};
use kaldb_types::{ChunkMetadata, LogEntry, Offset, Snapshot};
use uuid::Uuid;

use crate::{metrics::IndexingMetrics, transform::MessageTransformer, writer::ChunkIndexWriter};

#[derive(Debug, thiserror::Error)]
pub enum ChunkBuildError {
    #[error("chunk I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("chunk serialization failed: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("chunk upload failed: {0}")]
    Blob(#[from] BlobIoError),
    #[error("uploaded chunk {0} is not visible on the blob store")]
    UploadNotVisible(String),
    #[error("chunk contains no indexed documents")]
    Empty,
}

/// Builds one immutable chunk out of a bounded message stream: local index
/// directory, commit, upload, snapshot record.
///
/// The returned [`Snapshot`] is not yet published; publication to the
/// registry is the caller's commit point. The local directory is removed on
/// every exit path.
#[derive(Debug)]
pub struct ChunkBuilder {
    object_store: Arc<dyn ObjectStore>,
    transformer: Arc<dyn MessageTransformer>,
    data_dir: PathBuf,
    metrics: Arc<IndexingMetrics>,
}

impl ChunkBuilder {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        transformer: Arc<dyn MessageTransformer>,
        data_dir: PathBuf,
        metrics: Arc<IndexingMetrics>,
    ) -> Self {
        Self {
            object_store,
            transformer,
            data_dir,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<IndexingMetrics> {
        &self.metrics
    }

    /// Drains `messages` into a fresh chunk and uploads it. Offsets in the
    /// chunk id are the first and last consumed offsets; the snapshot time
    /// range covers the min/max document timestamps observed.
    pub async fn build<S>(
        &self,
        partition_id: &str,
        messages: S,
    ) -> Result<Snapshot, ChunkBuildError>
    where
        S: Stream<Item = LogEntry> + Send,
    {
        match self.build_inner(partition_id, messages).await {
            Ok(snapshot) => {
                self.metrics.record_rollover_completed();
                Ok(snapshot)
            }
            Err(err) => {
                self.metrics.record_rollover_failed();
                Err(err)
            }
        }
    }

    async fn build_inner<S>(
        &self,
        partition_id: &str,
        messages: S,
    ) -> Result<Snapshot, ChunkBuildError>
    where
        S: Stream<Item = LogEntry> + Send,
    {
        let build_id = Uuid::new_v4();
        let work_dir = self.data_dir.join(format!("building-{build_id}"));
        let _work_dir_guard = ChunkDirGuard::new(work_dir.clone());
        let mut writer = ChunkIndexWriter::create(&work_dir).await?;

        let mut first_offset: Option<Offset> = None;
        let mut last_offset: Option<Offset> = None;
        let mut start_time_ms = i64::MAX;
        let mut end_time_ms = i64::MIN;

        pin_mut!(messages);
        while let Some(entry) = messages.next().await {
            first_offset.get_or_insert(entry.offset);
            last_offset = Some(entry.offset);
            match self.transformer.transform(&entry) {
                Ok(document) => {
                    self.metrics.record_message_received();
                    start_time_ms = start_time_ms.min(document.timestamp_ms);
                    end_time_ms = end_time_ms.max(document.timestamp_ms);
                    writer.append(document).await?;
                }
                Err(err) => {
                    self.metrics.record_message_failed();
                    kaldb_logs::warn!(
                        "Failed to parse message at offset {} of partition {partition_id}: {err}",
                        entry.offset
                    );
                }
            }
        }

        if writer.document_count() == 0 {
            return Err(ChunkBuildError::Empty);
        }
        let (first_offset, last_offset) = (first_offset.unwrap(), last_offset.unwrap());
        let chunk_id = format!("{partition_id}-{first_offset}-{last_offset}-{build_id}");
        let metadata = ChunkMetadata {
            chunk_id: chunk_id.clone(),
            partition_id: partition_id.to_owned(),
            start_time_epoch_ms: start_time_ms,
            end_time_epoch_ms: end_time_ms,
            max_offset: last_offset,
            message_count: writer.document_count(),
            fields: writer.fields(),
        };
        let message_count = writer.document_count();
        writer.commit(&metadata).await?;

        let store = self.object_store.as_ref();
        self.metrics.record_rollover_initiated();
        let size_bytes = store.put_dir(&chunk_id, &work_dir).await?;
        if !store.exists(&chunk_id).await? {
            return Err(ChunkBuildError::UploadNotVisible(chunk_id));
        }
        kaldb_logs::info!(
            "Uploaded chunk {chunk_id} with {message_count} messages ({size_bytes} bytes)"
        );

        Ok(Snapshot {
            snapshot_path: format!("{}/{chunk_id}", store.store_prefix()),
            name: chunk_id,
            start_time_epoch_ms: start_time_ms,
            end_time_epoch_ms: end_time_ms,
            max_offset: last_offset,
            partition_id: partition_id.to_owned(),
            size_bytes,
        })
    }
}

/// Removes the chunk work directory on every exit path of a build.
#[derive(Debug)]
struct ChunkDirGuard {
    dir: PathBuf,
}

impl ChunkDirGuard {
    fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl Drop for ChunkDirGuard {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_dir_all(&self.dir) {
            if err.kind() != std::io::ErrorKind::NotFound {
                kaldb_logs::warn!(
                    "Failed to remove chunk work dir {}: {err}",
                    self.dir.display()
                );
            }
        }
    }
}
