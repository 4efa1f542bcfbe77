use std::{
    collections::BTreeSet,
    mem,
    path::{Path, PathBuf},
};

use kaldb_types::{ChunkMetadata, LogDocument};
use tokio::fs;

use crate::builder::ChunkBuildError;

const DOCUMENTS_PER_SEGMENT: usize = 10_000;

/// Writes documents into a local chunk directory as bincode-encoded segment
/// files. A commit flushes the tail segment and records the chunk metadata
/// beside the segments, so a committed directory always holds at least two
/// files.
#[derive(Debug)]
pub struct ChunkIndexWriter {
    dir: PathBuf,
    buffer: Vec<LogDocument>,
    segment_count: u32,
    document_count: u64,
    fields: BTreeSet<String>,
}

impl ChunkIndexWriter {
    pub async fn create(dir: &Path) -> Result<Self, ChunkBuildError> {
        fs::create_dir_all(dir).await?;
        Ok(Self {
            dir: dir.to_owned(),
            buffer: Vec::new(),
            segment_count: 0,
            document_count: 0,
            fields: BTreeSet::new(),
        })
    }

    pub async fn append(&mut self, document: LogDocument) -> Result<(), ChunkBuildError> {
        self.fields.extend(document.field_names());
        self.buffer.push(document);
        self.document_count += 1;
        if self.buffer.len() >= DOCUMENTS_PER_SEGMENT {
            self.flush_segment().await?;
        }
        Ok(())
    }

    async fn flush_segment(&mut self) -> Result<(), ChunkBuildError> {
        let documents = mem::take(&mut self.buffer);
        let bytes = bincode::serialize(&documents)?;
        let segment_path = self.dir.join(format!("segment_{:05}.bin", self.segment_count));
        fs::write(segment_path, bytes).await?;
        self.segment_count += 1;
        Ok(())
    }

    /// Flushes the remaining documents and seals the directory with the
    /// metadata record.
    pub async fn commit(mut self, metadata: &ChunkMetadata) -> Result<(), ChunkBuildError> {
        if !self.buffer.is_empty() || self.segment_count == 0 {
            self.flush_segment().await?;
        }
        let bytes = bincode::serialize(metadata)?;
        let metadata_path = self.dir.join(format!("{}.metadata", metadata.chunk_id));
        fs::write(metadata_path, bytes).await?;
        Ok(())
    }

    pub fn document_count(&self) -> u64 {
        self.document_count
    }

    /// Sorted top-level field names across every appended document.
    pub fn fields(&self) -> Vec<String> {
        self.fields.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use kaldb_types::Offset;
    use tempfile::TempDir;

    use super::*;

    fn document(id: u64) -> LogDocument {
        LogDocument {
            id: id.to_string(),
            timestamp_ms: 1_000 + id as i64,
            source: serde_json::json!({ "message": format!("msg-{id}"), "level": "info" }),
        }
    }

    fn metadata(chunk_id: &str, count: u64) -> ChunkMetadata {
        ChunkMetadata {
            chunk_id: chunk_id.to_string(),
            partition_id: "0".to_string(),
            start_time_epoch_ms: 1_000,
            end_time_epoch_ms: 1_000 + count as i64,
            max_offset: Offset(count as i64),
            message_count: count,
            fields: vec!["level".to_string(), "message".to_string()],
        }
    }

    #[tokio::test]
    async fn committed_directory_holds_segments_and_metadata() {
        let dir = TempDir::new().unwrap();
        let chunk_dir = dir.path().join("chunk");
        let mut writer = ChunkIndexWriter::create(&chunk_dir).await.unwrap();
        for id in 0..3 {
            writer.append(document(id)).await.unwrap();
        }
        assert_eq!(writer.document_count(), 3);
        assert_eq!(writer.fields(), vec!["level".to_string(), "message".to_string()]);

        writer.commit(&metadata("test-chunk", 3)).await.unwrap();

        let mut file_names: Vec<_> = std::fs::read_dir(&chunk_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        file_names.sort();
        assert_eq!(file_names, vec!["segment_00000.bin", "test-chunk.metadata"]);

        let bytes = std::fs::read(chunk_dir.join("segment_00000.bin")).unwrap();
        let documents: Vec<LogDocument> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(documents.len(), 3);
        assert_eq!(documents[0].id, "0");
    }

    #[tokio::test]
    async fn empty_commit_still_writes_a_segment() {
        let dir = TempDir::new().unwrap();
        let chunk_dir = dir.path().join("chunk");
        let writer = ChunkIndexWriter::create(&chunk_dir).await.unwrap();
        writer.commit(&metadata("empty-chunk", 0)).await.unwrap();

        let file_count = std::fs::read_dir(&chunk_dir).unwrap().count();
        assert_eq!(file_count, 2);
    }
}
