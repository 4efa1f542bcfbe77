use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use futures::channel::oneshot;
use kaldb_chunk::{ChunkBuilder, IndexingMetrics, JsonMessageTransformer};
use kaldb_config::{
    api::load_healthcheck_config, indexer::load_indexer_config, manager::load_manager_config,
    metadata_store::load_metadata_store_config, node::NodeConfig,
    object_store::load_object_store_config, upstream_log::load_upstream_log_config,
};
use kaldb_event_log::EventLogFactory;
use kaldb_health_check::CheckHealth;
use kaldb_metadata_store::{CachedStore, MetadataStoreFactory, TypedStore};
use kaldb_object_store::make_object_store;
use kaldb_types::NodeRole;
use tokio::{sync::watch, task::JoinHandle};

pub mod healthcheck;
pub mod indexer;
pub mod manager;
pub mod recovery;

pub use crate::healthcheck::HealthServer;
use crate::{
    indexer::IndexerService,
    manager::{RecoveryTaskAssignmentService, SnapshotCleanerService},
    recovery::{RecoveryNodeService, RecoveryTaskRunner},
};

/// Wires up the components of the configured role and spawns their tasks.
/// The node's health endpoint is one of the returned tasks; every task stops
/// on the returned sender.
pub async fn initialize_components(
    node_config: &NodeConfig,
) -> anyhow::Result<(Vec<JoinHandle<()>>, watch::Sender<bool>)> {
    let metadata_store_config =
        load_metadata_store_config().expect("failed to load metadata store config");
    let metadata_store = MetadataStoreFactory::new(metadata_store_config.clone()).create_store();
    let path_prefix = metadata_store_config.path_prefix.as_str();

    let (stop_sender, stop_receiver) = watch::channel(false);
    let mut healthchecks: Vec<Box<dyn CheckHealth>> = Vec::new();
    let mut task_futures: Vec<JoinHandle<()>> = vec![];

    match node_config.role {
        NodeRole::Recovery => {
            let upstream_config =
                load_upstream_log_config().expect("failed to load upstream log config");
            let object_store_config =
                load_object_store_config().expect("failed to load object store config");
            let object_store = make_object_store(&object_store_config).await;
            let event_log = EventLogFactory::new(upstream_config.clone()).create_log();
            let chunk_builder = ChunkBuilder::new(
                object_store,
                Arc::new(JsonMessageTransformer),
                PathBuf::from(&node_config.data_dir),
                Arc::new(IndexingMetrics::new()),
            );
            let task_runner = RecoveryTaskRunner::new(
                event_log,
                chunk_builder,
                TypedStore::new(Arc::clone(&metadata_store), path_prefix),
                upstream_config.topic.clone(),
                upstream_config.max_poll_records,
                node_config.operation_timeout(),
            );
            let service = RecoveryNodeService::new(
                node_config.name.clone(),
                TypedStore::new(Arc::clone(&metadata_store), path_prefix),
                TypedStore::new(Arc::clone(&metadata_store), path_prefix),
                task_runner,
            );
            healthchecks.push(Box::new(service.health_check()));
            let stop_receiver = stop_receiver.clone();
            task_futures.push(tokio::spawn(async move {
                service
                    .run(stop_receiver)
                    .await
                    .expect("recovery node service failed");
            }));
        }
        NodeRole::Manager => {
            let manager_config = load_manager_config().expect("failed to load manager config");
            let object_store_config =
                load_object_store_config().expect("failed to load object store config");
            let object_store = make_object_store(&object_store_config).await;

            let task_cache =
                CachedStore::new(TypedStore::new(Arc::clone(&metadata_store), path_prefix))
                    .await
                    .context("failed to build recovery task cache")?;
            let node_cache =
                CachedStore::new(TypedStore::new(Arc::clone(&metadata_store), path_prefix))
                    .await
                    .context("failed to build recovery node cache")?;
            let assignment_service = RecoveryTaskAssignmentService::new(
                task_cache,
                node_cache,
                manager_config.schedule_period(),
            );
            healthchecks.push(Box::new(assignment_service.health_check()));
            let assignment_stop = stop_receiver.clone();
            task_futures.push(tokio::spawn(async move {
                assignment_service
                    .run(assignment_stop)
                    .await
                    .expect("recovery task assignment service failed");
            }));

            let cleaner_service = SnapshotCleanerService::new(
                TypedStore::new(Arc::clone(&metadata_store), path_prefix),
                object_store,
                manager_config.snapshot_lifespan(),
                manager_config.schedule_period(),
            );
            let cleaner_stop = stop_receiver.clone();
            task_futures.push(tokio::spawn(async move {
                cleaner_service
                    .run(cleaner_stop)
                    .await
                    .expect("snapshot cleaner service failed");
            }));
        }
        NodeRole::Index => {
            let indexer_config = load_indexer_config().expect("failed to load indexer config");
            let upstream_config =
                load_upstream_log_config().expect("failed to load upstream log config");
            let object_store_config =
                load_object_store_config().expect("failed to load object store config");
            let object_store = make_object_store(&object_store_config).await;
            let event_log = EventLogFactory::new(upstream_config.clone()).create_log();
            let chunk_builder = ChunkBuilder::new(
                object_store,
                Arc::new(JsonMessageTransformer),
                PathBuf::from(&node_config.data_dir),
                Arc::new(IndexingMetrics::new()),
            );
            let service = IndexerService::new(
                indexer_config.partition_id.clone(),
                upstream_config.topic.clone(),
                event_log,
                chunk_builder,
                TypedStore::new(Arc::clone(&metadata_store), path_prefix),
                TypedStore::new(Arc::clone(&metadata_store), path_prefix),
                indexer_config.max_offset_delay_messages,
                indexer_config.max_messages_per_chunk,
                upstream_config.max_poll_records,
                upstream_config.poll_timeout(),
            );
            healthchecks.push(Box::new(service.health_check()));
            let stop_receiver = stop_receiver.clone();
            task_futures.push(tokio::spawn(async move {
                service
                    .run(stop_receiver)
                    .await
                    .expect("indexer service failed");
            }));
        }
        role @ (NodeRole::Query | NodeRole::Cache | NodeRole::Preprocessor) => {
            kaldb_logs::info!(
                "Role {role} has no core components in this build; serving the health endpoint only"
            );
        }
    }

    let healthcheck_config =
        load_healthcheck_config().expect("failed to load health check config");
    let health_server = HealthServer::new(
        healthcheck_config.bind_addr(),
        node_config.name.clone(),
        node_config.role,
        healthchecks,
    );
    task_futures.push(tokio::spawn(async move {
        health_server
            .run(stop_receiver)
            .await
            .expect("health endpoint failed");
    }));
    Ok((task_futures, stop_sender))
}

pub fn setup_sigint_handler() -> oneshot::Receiver<()> {
    let (sigint_sender, sigint_receiver) = oneshot::channel();
    let mut sigint_sender = Some(sigint_sender);
    ctrlc::set_handler(move || {
        if let Some(sigint_sender) = sigint_sender.take() {
            sigint_sender.send(()).ok();
            // ^ The send fails if `sigint_receiver` is dropped. We're OK with this,
            // since at this point the node should be stopping anyway, or is not interested
            // in listening to interrupt signals.
        }
    })
    .expect("Error setting Ctrl+C handler");

    sigint_receiver
}
