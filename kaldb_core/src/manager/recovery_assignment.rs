use std::{collections::HashSet, time::Duration};

use kaldb_health_check::{HealthStatus, HealthUpdater, ReactiveHealthCheck};
use kaldb_metadata_store::CachedStore;
use kaldb_types::{RecoveryNode, RecoveryTask};
use kaldb_utils::time::millis_since_epoch;
use tokio::sync::watch;

/// Pairs unassigned recovery tasks with FREE recovery nodes, oldest task
/// first. Runs on a fixed schedule; an assignment that loses a race (the
/// node entry changed under us) is logged and retried next cycle. Tasks are
/// never deleted here; that is the worker's job on success.
#[derive(Debug)]
pub struct RecoveryTaskAssignmentService {
    task_cache: CachedStore<RecoveryTask>,
    node_cache: CachedStore<RecoveryNode>,
    schedule_period: Duration,
    health_updater: HealthUpdater,
    health: ReactiveHealthCheck,
}

impl RecoveryTaskAssignmentService {
    pub fn new(
        task_cache: CachedStore<RecoveryTask>,
        node_cache: CachedStore<RecoveryNode>,
        schedule_period: Duration,
    ) -> Self {
        let (health, health_updater) = ReactiveHealthCheck::new("recovery_task_assignment");
        Self {
            task_cache,
            node_cache,
            schedule_period,
            health_updater,
            health,
        }
    }

    pub fn health_check(&self) -> ReactiveHealthCheck {
        self.health.clone()
    }

    pub async fn run(self, mut stop_receiver: watch::Receiver<bool>) -> anyhow::Result<()> {
        self.health_updater.update(HealthStatus::Ready.into());
        loop {
            if *stop_receiver.borrow() {
                kaldb_logs::info!("Stop signal received, task assignment is shutting down");
                break;
            }
            let assigned = self.assign_pending_tasks().await;
            if assigned > 0 {
                kaldb_logs::info!("Assigned {assigned} recovery tasks");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.schedule_period) => {}
                changed = stop_receiver.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// One assignment cycle over the cached views; returns the number of
    /// nodes successfully moved to ASSIGNED.
    pub async fn assign_pending_tasks(&self) -> usize {
        let tasks = self.task_cache.list_cached().await;
        let nodes = self.node_cache.list_cached().await;

        // A task already named by any node entry is in flight.
        let held_tasks: HashSet<&str> = nodes
            .iter()
            .filter(|node| !node.recovery_task_name.is_empty())
            .map(|node| node.recovery_task_name.as_str())
            .collect();
        let mut assignable: Vec<_> = tasks
            .iter()
            .filter(|task| !held_tasks.contains(task.name.as_str()))
            .collect();
        assignable.sort_by_key(|task| (task.created_at_ms, task.name.clone()));

        let mut free_nodes: Vec<_> = nodes.iter().filter(|node| node.is_free()).collect();
        free_nodes.sort_by(|a, b| a.name.cmp(&b.name));

        if assignable.len() > free_nodes.len() {
            kaldb_logs::info!(
                "{} recovery tasks are waiting for a FREE node",
                assignable.len() - free_nodes.len()
            );
        }

        let mut assigned = 0;
        for (task, node) in assignable.iter().zip(free_nodes) {
            let update = node.assigned(&task.name, millis_since_epoch());
            // The write goes to the authoritative store, not the cache; a
            // changed node entry surfaces as an error here.
            match self.node_cache.store().update(&update).await {
                Ok(()) => {
                    kaldb_logs::info!(
                        "Assigned recovery task {} to node {}",
                        task.name,
                        node.name
                    );
                    assigned += 1;
                }
                Err(err) => {
                    kaldb_logs::warn!(
                        "Assignment of {} to {} failed, retrying next cycle: {err}",
                        task.name,
                        node.name
                    );
                }
            }
        }
        assigned
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kaldb_metadata_store::{
        MetadataStoreFactory, RecoveryNodeStore, RecoveryTaskStore, TypedStore,
    };
    use kaldb_types::{Offset, RecoveryNodeState};

    use super::*;

    fn task(name: &str, created_at_ms: i64) -> RecoveryTask {
        RecoveryTask::new(name, "0", Offset(0), Offset(10), created_at_ms)
    }

    #[tokio::test]
    async fn pairs_oldest_tasks_with_free_nodes() {
        let store = MetadataStoreFactory::mock().create_store();
        let task_store: RecoveryTaskStore = TypedStore::new(Arc::clone(&store), "/kaldb");
        let node_store: RecoveryNodeStore = TypedStore::new(Arc::clone(&store), "/kaldb");

        task_store.create(&task("newer", 2_000)).await.unwrap();
        task_store.create(&task("older", 1_000)).await.unwrap();
        node_store
            .create(&RecoveryNode::free("node1", 0))
            .await
            .unwrap();

        let service = RecoveryTaskAssignmentService::new(
            CachedStore::new(task_store).await.unwrap(),
            CachedStore::new(node_store.clone()).await.unwrap(),
            Duration::from_secs(60),
        );
        assert_eq!(service.assign_pending_tasks().await, 1);

        let node = node_store.get("node1").await.unwrap();
        assert_eq!(node.state, RecoveryNodeState::Assigned);
        assert_eq!(node.recovery_task_name, "older");

        // Tasks are left in place; only the node entry changed.
        assert_eq!(service.task_cache.store().list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn held_tasks_are_not_reassigned() {
        let store = MetadataStoreFactory::mock().create_store();
        let task_store: RecoveryTaskStore = TypedStore::new(Arc::clone(&store), "/kaldb");
        let node_store: RecoveryNodeStore = TypedStore::new(Arc::clone(&store), "/kaldb");

        task_store.create(&task("inflight", 1_000)).await.unwrap();
        let busy = RecoveryNode::free("busy", 0).assigned("inflight", 1);
        node_store.create(&busy).await.unwrap();
        node_store
            .create(&RecoveryNode::free("idle", 0))
            .await
            .unwrap();

        let service = RecoveryTaskAssignmentService::new(
            CachedStore::new(task_store).await.unwrap(),
            CachedStore::new(node_store.clone()).await.unwrap(),
            Duration::from_secs(60),
        );
        assert_eq!(service.assign_pending_tasks().await, 0);

        let idle = node_store.get("idle").await.unwrap();
        assert_eq!(idle.state, RecoveryNodeState::Free);
    }

    #[tokio::test]
    async fn surplus_tasks_wait_for_the_next_cycle() {
        let store = MetadataStoreFactory::mock().create_store();
        let task_store: RecoveryTaskStore = TypedStore::new(Arc::clone(&store), "/kaldb");
        let node_store: RecoveryNodeStore = TypedStore::new(Arc::clone(&store), "/kaldb");

        for i in 0..3 {
            task_store.create(&task(&format!("t{i}"), i)).await.unwrap();
        }
        node_store
            .create(&RecoveryNode::free("node1", 0))
            .await
            .unwrap();

        let service = RecoveryTaskAssignmentService::new(
            CachedStore::new(task_store).await.unwrap(),
            CachedStore::new(node_store).await.unwrap(),
            Duration::from_secs(60),
        );
        assert_eq!(service.assign_pending_tasks().await, 1);
    }
}
