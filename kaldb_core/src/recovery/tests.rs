use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use kaldb_chunk::{ChunkBuilder, IndexingMetrics, JsonMessageTransformer};
use kaldb_event_log::{EventLog, MemoryEventLog};
use kaldb_metadata_store::{
    MetadataStore, MetadataStoreError, MetadataStoreFactory, RecoveryNodeStore, RecoveryTaskStore,
    SnapshotStore, TypedStore,
};
use kaldb_object_store::{BlobIoError, MockStore, ObjectStore};
use kaldb_types::{Offset, Partition, RecoveryNodeState, RecoveryTask};
use tempfile::TempDir;
use tokio::sync::watch;

use super::{RecoveryNodeService, RecoveryTaskRunner};

const TOPIC: &str = "test-topic";
const PATH_PREFIX: &str = "/kaldb";
/// 2020-10-01T10:10:00Z.
const BASE_TIMESTAMP_MS: i64 = 1_601_547_000_000;

const RETRY_INTERVAL: Duration = Duration::from_millis(10);
const MAX_RETRIES: usize = 500;

fn produce_messages(log: &MemoryEventLog, start_offset: i64, count: i64) {
    for i in 0..count {
        let offset = start_offset + i;
        let timestamp_ms = BASE_TIMESTAMP_MS + i * 1_000;
        let payload =
            format!(r#"{{"timestamp": {timestamp_ms}, "message": "log-{offset}"}}"#);
        log.append_at(
            TOPIC,
            Partition(0),
            Offset(offset),
            timestamp_ms,
            payload.into_bytes(),
        );
    }
}

struct Fixture {
    event_log: Arc<MemoryEventLog>,
    object_store: Arc<dyn ObjectStore>,
    metadata_store: Arc<dyn MetadataStore>,
    indexing_metrics: Arc<IndexingMetrics>,
    data_dir: TempDir,
}

impl Fixture {
    async fn new() -> Self {
        Self {
            event_log: Arc::new(MemoryEventLog::default()),
            object_store: Arc::new(MockStore::default()),
            metadata_store: MetadataStoreFactory::mock().create_store(),
            indexing_metrics: Arc::new(IndexingMetrics::new()),
            data_dir: TempDir::new().expect("failed creating temporary dir"),
        }
    }

    fn snapshot_store(&self) -> SnapshotStore {
        TypedStore::new(Arc::clone(&self.metadata_store), PATH_PREFIX)
    }

    fn task_store(&self) -> RecoveryTaskStore {
        TypedStore::new(Arc::clone(&self.metadata_store), PATH_PREFIX)
    }

    fn node_store(&self) -> RecoveryNodeStore {
        TypedStore::new(Arc::clone(&self.metadata_store), PATH_PREFIX)
    }

    fn task_runner(&self) -> RecoveryTaskRunner {
        self.task_runner_on(Arc::clone(&self.object_store))
    }

    fn task_runner_on(&self, object_store: Arc<dyn ObjectStore>) -> RecoveryTaskRunner {
        let chunk_builder = ChunkBuilder::new(
            object_store,
            Arc::new(JsonMessageTransformer),
            self.data_dir.path().to_owned(),
            Arc::clone(&self.indexing_metrics),
        );
        RecoveryTaskRunner::new(
            Arc::clone(&self.event_log) as Arc<dyn EventLog>,
            chunk_builder,
            self.snapshot_store(),
            TOPIC,
            100,
            Duration::from_secs(30),
        )
    }
}

fn test_task() -> RecoveryTask {
    RecoveryTask::new("testRecoveryTask", "0", Offset(30), Offset(60), BASE_TIMESTAMP_MS)
}

/// Object store wrapper that fails writes, modeling a missing bucket.
struct UnreachableStore(Arc<dyn ObjectStore>);

impl fmt::Debug for UnreachableStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.as_ref().fmt(formatter)
    }
}

#[async_trait]
impl ObjectStore for UnreachableStore {
    async fn get_raw(&self, key: &str) -> Result<Vec<u8>, BlobIoError> {
        self.0.get_raw(key).await
    }

    async fn put_raw(&self, key: &str, _value: Vec<u8>) -> Result<(), BlobIoError> {
        Err(BlobIoError::new("put", key, "bucket does not exist"))
    }

    async fn remove_raw(&self, key: &str) -> Result<(), BlobIoError> {
        self.0.remove_raw(key).await
    }

    async fn list_raw(&self, prefix: &str) -> Result<Vec<String>, BlobIoError> {
        self.0.list_raw(prefix).await
    }

    fn store_prefix(&self) -> String {
        self.0.store_prefix()
    }
}

#[tokio::test]
async fn recovery_task_happy_path() {
    let fixture = Fixture::new().await;
    produce_messages(&fixture.event_log, 30, 31);
    let runner = fixture.task_runner();

    assert!(runner.handle_recovery_task(&test_task()).await);

    let published = fixture.snapshot_store().list().await.unwrap();
    assert_eq!(published.len(), 1);
    let snapshot = &published[0];
    assert_eq!(snapshot.partition_id, "0");
    assert_eq!(snapshot.max_offset, Offset(60));
    assert_eq!(snapshot.start_time_epoch_ms, BASE_TIMESTAMP_MS);
    assert_eq!(snapshot.end_time_epoch_ms, BASE_TIMESTAMP_MS + 30_000);

    let uploaded = fixture
        .object_store
        .list_raw(&format!("{}/", snapshot.name))
        .await
        .unwrap();
    assert!(uploaded.len() > 1, "expected segments and metadata: {uploaded:?}");

    let metrics = &fixture.indexing_metrics;
    assert_eq!(metrics.messages_received(), 31);
    assert_eq!(metrics.messages_failed(), 0);
    assert_eq!(metrics.rollovers_initiated(), 1);
    assert_eq!(metrics.rollovers_completed(), 1);
    assert_eq!(metrics.rollovers_failed(), 0);
}

#[tokio::test]
async fn recovery_task_fails_when_the_blob_store_is_unreachable() {
    let fixture = Fixture::new().await;
    produce_messages(&fixture.event_log, 30, 31);
    let unreachable: Arc<dyn ObjectStore> =
        Arc::new(UnreachableStore(Arc::clone(&fixture.object_store)));
    let runner = fixture.task_runner_on(unreachable);

    assert!(!runner.handle_recovery_task(&test_task()).await);

    assert!(fixture.snapshot_store().list().await.unwrap().is_empty());
    let metrics = &fixture.indexing_metrics;
    assert_eq!(metrics.rollovers_initiated(), 1);
    assert_eq!(metrics.rollovers_completed(), 0);
    assert_eq!(metrics.rollovers_failed(), 1);
}

#[tokio::test]
async fn aged_out_range_is_a_terminal_failure() {
    let fixture = Fixture::new().await;
    produce_messages(&fixture.event_log, 100, 10);
    let runner = fixture.task_runner();

    let task = RecoveryTask::new("agedOut", "0", Offset(1), Offset(50), BASE_TIMESTAMP_MS);
    assert!(!runner.handle_recovery_task(&task).await);

    assert!(fixture.snapshot_store().list().await.unwrap().is_empty());
    assert_eq!(fixture.indexing_metrics.rollovers_initiated(), 0);
    assert_eq!(fixture.indexing_metrics.rollovers_failed(), 1);
}

#[tokio::test]
async fn partially_aged_out_range_is_clamped() {
    let fixture = Fixture::new().await;
    produce_messages(&fixture.event_log, 0, 10);
    fixture
        .event_log
        .truncate_before(TOPIC, Partition(0), Offset(5));
    let runner = fixture.task_runner();

    let task = RecoveryTask::new("clamped", "0", Offset(0), Offset(9), BASE_TIMESTAMP_MS);
    assert!(runner.handle_recovery_task(&task).await);

    assert_eq!(fixture.indexing_metrics.messages_received(), 5);
    let published = fixture.snapshot_store().list().await.unwrap();
    assert_eq!(published[0].max_offset, Offset(9));
    assert!(published[0].name.starts_with("0-5-9-"));
}

async fn wait_for(description: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..MAX_RETRIES {
        if condition() {
            return;
        }
        tokio::time::sleep(RETRY_INTERVAL).await;
    }
    panic!("timed out waiting for {description}");
}

#[tokio::test]
async fn assigned_node_recovers_the_task_and_returns_to_free() {
    let fixture = Fixture::new().await;
    produce_messages(&fixture.event_log, 30, 31);
    let node_store = fixture.node_store();
    let task_store = fixture.task_store();
    let service = RecoveryNodeService::new(
        "recoveryNode1",
        node_store.clone(),
        task_store.clone(),
        fixture.task_runner(),
    );
    let metrics = service.metrics();
    let (stop_sender, stop_receiver) = watch::channel(false);
    let service_handle = tokio::spawn(service.run(stop_receiver));

    // Node registers itself FREE before accepting work.
    for _ in 0..MAX_RETRIES {
        if node_store.get("recoveryNode1").await.is_ok() {
            break;
        }
        tokio::time::sleep(RETRY_INTERVAL).await;
    }

    task_store.create(&test_task()).await.unwrap();
    let node = node_store.get("recoveryNode1").await.unwrap();
    node_store
        .update(&node.assigned("testRecoveryTask", BASE_TIMESTAMP_MS))
        .await
        .unwrap();

    let metrics_ref = Arc::clone(&metrics);
    wait_for("assignment success", move || {
        metrics_ref.assignment_success() == 1
    })
    .await;
    assert_eq!(metrics.assignment_received(), 1);
    assert_eq!(metrics.assignment_failed(), 0);

    let node = node_store.get("recoveryNode1").await.unwrap();
    assert_eq!(node.state, RecoveryNodeState::Free);
    assert_eq!(node.recovery_task_name, "");
    assert!(matches!(
        task_store.get("testRecoveryTask").await.unwrap_err(),
        MetadataStoreError::NotFound(_)
    ));
    assert_eq!(fixture.snapshot_store().list().await.unwrap().len(), 1);

    stop_sender.send(true).unwrap();
    service_handle.await.unwrap().unwrap();
    // Graceful shutdown removes the node entry.
    assert!(node_store.get("recoveryNode1").await.is_err());
}

#[tokio::test]
async fn failed_recovery_leaves_the_task_for_reassignment() {
    let fixture = Fixture::new().await;
    produce_messages(&fixture.event_log, 30, 31);
    let unreachable: Arc<dyn ObjectStore> =
        Arc::new(UnreachableStore(Arc::clone(&fixture.object_store)));
    let node_store = fixture.node_store();
    let task_store = fixture.task_store();
    let service = RecoveryNodeService::new(
        "recoveryNode1",
        node_store.clone(),
        task_store.clone(),
        fixture.task_runner_on(unreachable),
    );
    let metrics = service.metrics();
    let (_stop_sender, stop_receiver) = watch::channel(false);
    let _service_handle = tokio::spawn(service.run(stop_receiver));

    for _ in 0..MAX_RETRIES {
        if node_store.get("recoveryNode1").await.is_ok() {
            break;
        }
        tokio::time::sleep(RETRY_INTERVAL).await;
    }

    task_store.create(&test_task()).await.unwrap();
    let node = node_store.get("recoveryNode1").await.unwrap();
    node_store
        .update(&node.assigned("testRecoveryTask", BASE_TIMESTAMP_MS))
        .await
        .unwrap();

    let metrics_ref = Arc::clone(&metrics);
    wait_for("assignment failure", move || {
        metrics_ref.assignment_failed() == 1
    })
    .await;
    assert_eq!(metrics.assignment_success(), 0);

    // The task record is untouched and the node is FREE for the next cycle.
    assert_eq!(
        task_store.get("testRecoveryTask").await.unwrap(),
        test_task()
    );
    let node = node_store.get("recoveryNode1").await.unwrap();
    assert_eq!(node.state, RecoveryNodeState::Free);
    assert_eq!(node.recovery_task_name, "");
    assert!(fixture.snapshot_store().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_node_entry_is_taken_over_on_startup() {
    let fixture = Fixture::new().await;
    let node_store = fixture.node_store();
    // Entry left behind by a crashed incarnation of the same node.
    node_store
        .create(&kaldb_types::RecoveryNode {
            name: "recoveryNode1".to_string(),
            state: RecoveryNodeState::Recovering,
            recovery_task_name: "staleTask".to_string(),
            updated_at_ms: BASE_TIMESTAMP_MS,
        })
        .await
        .unwrap();

    let service = RecoveryNodeService::new(
        "recoveryNode1",
        node_store.clone(),
        fixture.task_store(),
        fixture.task_runner(),
    );
    let (_stop_sender, stop_receiver) = watch::channel(false);
    let _service_handle = tokio::spawn(service.run(stop_receiver));

    for _ in 0..MAX_RETRIES {
        let node = node_store.get("recoveryNode1").await.unwrap();
        if node.state == RecoveryNodeState::Free && node.recovery_task_name.is_empty() {
            return;
        }
        tokio::time::sleep(RETRY_INTERVAL).await;
    }
    panic!("node entry was not reset to FREE");
}
