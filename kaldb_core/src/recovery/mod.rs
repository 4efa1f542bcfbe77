//! Recovery node: watches its own coordination entry and executes assigned
//! recovery tasks one at a time.

use std::sync::Arc;

use anyhow::Context as _;
use kaldb_health_check::{HealthStatus, HealthUpdater, ReactiveHealthCheck};
use kaldb_metadata_store::{
    RecoveryNodeStore, RecoveryTaskStore, TypedWatch, TypedWatchEvent,
};
use kaldb_types::{RecoveryNode, RecoveryNodeState};
use kaldb_utils::time::millis_since_epoch;
use tokio::sync::{mpsc, watch};

mod metrics;
mod offset_validator;
mod task_runner;

pub use self::{
    metrics::RecoveryNodeMetrics, offset_validator::validate_offsets,
    task_runner::RecoveryTaskRunner,
};

/// State machine of one recovery node: FREE -> ASSIGNED (manager-driven) ->
/// RECOVERING -> FREE. The node registers itself FREE on startup, executes at
/// most one task at a time and always returns to FREE, leaving the task
/// record in place on failure so the manager can reassign it.
#[derive(Debug)]
pub struct RecoveryNodeService {
    node_name: String,
    node_store: RecoveryNodeStore,
    task_store: RecoveryTaskStore,
    task_runner: RecoveryTaskRunner,
    metrics: Arc<RecoveryNodeMetrics>,
    health_updater: HealthUpdater,
    health: ReactiveHealthCheck,
}

impl RecoveryNodeService {
    pub fn new(
        node_name: impl Into<String>,
        node_store: RecoveryNodeStore,
        task_store: RecoveryTaskStore,
        task_runner: RecoveryTaskRunner,
    ) -> Self {
        let (health, health_updater) = ReactiveHealthCheck::new("recovery_node");
        Self {
            node_name: node_name.into(),
            node_store,
            task_store,
            task_runner,
            metrics: Arc::new(RecoveryNodeMetrics::new()),
            health_updater,
            health,
        }
    }

    pub fn health_check(&self) -> ReactiveHealthCheck {
        self.health.clone()
    }

    pub fn metrics(&self) -> Arc<RecoveryNodeMetrics> {
        Arc::clone(&self.metrics)
    }

    pub async fn run(self, mut stop_receiver: watch::Receiver<bool>) -> anyhow::Result<()> {
        // Subscribe before the FREE entry becomes visible, so an assignment
        // cannot slip between registration and the watch.
        let entry_watch = self.node_store.watch();
        self.register_free().await?;

        // The watch listener must never do recovery I/O: it only posts the
        // assigned task name into a single-slot mailbox owned by this loop.
        let (assignment_sender, mut assignment_receiver) = mpsc::channel::<String>(1);
        let listener = tokio::spawn(run_assignment_listener(
            entry_watch,
            self.node_store.clone(),
            self.node_name.clone(),
            assignment_sender,
        ));

        self.health_updater.update(HealthStatus::Ready.into());
        kaldb_logs::info!("Recovery node {} is FREE and watching for work", self.node_name);

        loop {
            tokio::select! {
                changed = stop_receiver.changed() => {
                    if changed.is_err() || *stop_receiver.borrow() {
                        kaldb_logs::info!(
                            "Stop signal received, recovery node {} is shutting down",
                            self.node_name
                        );
                        break;
                    }
                }
                maybe_task = assignment_receiver.recv() => {
                    let Some(task_name) = maybe_task else { break };
                    self.process_assignment(&task_name).await;
                }
            }
        }

        listener.abort();
        if let Err(err) = self.node_store.delete(&self.node_name).await {
            kaldb_logs::warn!(
                "Failed to remove node entry {} on shutdown: {err}",
                self.node_name
            );
        }
        Ok(())
    }

    /// Creates the node entry FREE; a leftover entry from a previous
    /// incarnation of the same node is taken over instead.
    async fn register_free(&self) -> anyhow::Result<()> {
        let node = RecoveryNode::free(&self.node_name, millis_since_epoch());
        match self.node_store.create(&node).await {
            Ok(()) => Ok(()),
            Err(kaldb_metadata_store::MetadataStoreError::AlreadyExists(_)) => {
                kaldb_logs::warn!(
                    "Node entry {} already exists, re-registering as FREE",
                    self.node_name
                );
                self.node_store
                    .update(&node)
                    .await
                    .context("failed to re-register node entry")
            }
            Err(err) => Err(err).context("failed to register node entry"),
        }
    }

    async fn process_assignment(&self, task_name: &str) {
        self.metrics.record_assignment_received();
        kaldb_logs::info!(
            "Node {} received assignment for recovery task {task_name}",
            self.node_name
        );

        let success = match self.accept_assignment().await {
            Ok(()) => self.execute_task(task_name).await,
            Err(err) => {
                kaldb_logs::error!(
                    "Node {} could not accept assignment for {task_name}: {err}",
                    self.node_name
                );
                false
            }
        };
        if success {
            self.metrics.record_assignment_success();
        } else {
            self.metrics.record_assignment_failed();
        }

        // The node returns to FREE on every path, success or not.
        self.return_to_free().await;
    }

    /// ASSIGNED -> RECOVERING on the node's own entry.
    async fn accept_assignment(&self) -> anyhow::Result<()> {
        let node = self.node_store.get(&self.node_name).await?;
        self.node_store
            .update(&node.recovering(millis_since_epoch()))
            .await?;
        Ok(())
    }

    /// Runs the task; on success also deletes the task record. A missing or
    /// failing task leaves the record in place for reassignment.
    async fn execute_task(&self, task_name: &str) -> bool {
        let task = match self.task_store.get(task_name).await {
            Ok(task) => task,
            Err(err) => {
                kaldb_logs::error!("Recovery task {task_name} could not be loaded: {err}");
                return false;
            }
        };
        if !self.task_runner.handle_recovery_task(&task).await {
            return false;
        }
        match self.task_store.delete(task_name).await {
            Ok(()) => true,
            Err(err) => {
                kaldb_logs::error!(
                    "Recovered task {task_name} but failed to delete its record: {err}"
                );
                false
            }
        }
    }

    async fn return_to_free(&self) {
        let node = RecoveryNode::free(&self.node_name, millis_since_epoch());
        if let Err(err) = self.node_store.update(&node).await {
            kaldb_logs::error!(
                "Failed to return node {} to FREE: {err}",
                self.node_name
            );
        }
    }
}

/// Forwards ASSIGNED transitions of this node's entry into the mailbox.
/// While the worker is busy the mailbox is full and new assignments are
/// dropped with a log line; the manager cannot legally produce them anyway
/// since the node is not FREE.
async fn run_assignment_listener(
    mut watch: TypedWatch<RecoveryNode>,
    node_store: RecoveryNodeStore,
    node_name: String,
    assignment_sender: mpsc::Sender<String>,
) {
    loop {
        let node = match watch.next().await {
            Some(TypedWatchEvent::Created(node)) | Some(TypedWatchEvent::Updated(node)) => node,
            Some(TypedWatchEvent::Deleted { .. }) => continue,
            Some(TypedWatchEvent::Lagged) => {
                // Watch fell behind; recheck our entry directly so an
                // assignment cannot be lost.
                match node_store.get(&node_name).await {
                    Ok(node) => node,
                    Err(err) => {
                        kaldb_logs::warn!("Node {node_name} resync after lag failed: {err}");
                        continue;
                    }
                }
            }
            None => return,
        };
        if node.name != node_name || node.state != RecoveryNodeState::Assigned {
            continue;
        }
        match assignment_sender.try_send(node.recovery_task_name.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(task_name)) => {
                kaldb_logs::warn!(
                    "Ignoring assignment {task_name}: node {node_name} is already recovering"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return,
        }
    }
}

#[cfg(test)]
mod tests;
