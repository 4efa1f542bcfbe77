use kaldb_types::{
    DatasetPartitionMetadata, Offset, RecoveryNode, RecoveryTask, Snapshot,
};

use crate::{
    store::MetadataStoreError,
    typed::{MetadataRecord, TypedStore},
};

impl MetadataRecord for RecoveryTask {
    const DIRECTORY: &'static str = "recoveryTasks";

    fn name(&self) -> &str {
        &self.name
    }
}

impl MetadataRecord for RecoveryNode {
    const DIRECTORY: &'static str = "recoveryNodes";

    fn name(&self) -> &str {
        &self.name
    }
}

impl MetadataRecord for Snapshot {
    const DIRECTORY: &'static str = "snapshots";

    fn name(&self) -> &str {
        &self.name
    }
}

impl MetadataRecord for DatasetPartitionMetadata {
    const DIRECTORY: &'static str = "datasets";

    fn name(&self) -> &str {
        &self.name
    }
}

pub type RecoveryTaskStore = TypedStore<RecoveryTask>;
pub type RecoveryNodeStore = TypedStore<RecoveryNode>;
pub type SnapshotStore = TypedStore<Snapshot>;
pub type DatasetStore = TypedStore<DatasetPartitionMetadata>;

/// Registry queries over published snapshots. The registry is append-only:
/// `create` on an existing name fails, which makes retried publications with
/// fresh chunk ids observable as distinct records.
impl SnapshotStore {
    pub async fn list_by_partition(
        &self,
        partition_id: &str,
    ) -> Result<Vec<Snapshot>, MetadataStoreError> {
        let snapshots = self.list().await?;
        Ok(snapshots
            .into_iter()
            .filter(|snapshot| snapshot.partition_id == partition_id)
            .collect())
    }

    pub async fn list_in_range(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Snapshot>, MetadataStoreError> {
        let snapshots = self.list().await?;
        Ok(snapshots
            .into_iter()
            .filter(|snapshot| snapshot.overlaps(start_ms, end_ms))
            .collect())
    }

    /// Highest offset any published snapshot covers for the partition.
    /// `None` when the partition has no snapshots yet.
    pub async fn max_indexed_offset(
        &self,
        partition_id: &str,
    ) -> Result<Option<Offset>, MetadataStoreError> {
        let snapshots = self.list_by_partition(partition_id).await?;
        Ok(snapshots.iter().map(|snapshot| snapshot.max_offset).max())
    }
}
