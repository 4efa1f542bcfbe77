use std::sync::{
    atomic::{AtomicU64, Ordering},
    Once,
};

/// Counter names are contracts; dashboards and tests key off them.
const RECOVERY_NODE_ASSIGNMENT_RECEIVED: &str = "RECOVERY_NODE_ASSIGNMENT_RECEIVED";
const RECOVERY_NODE_ASSIGNMENT_SUCCESS: &str = "RECOVERY_NODE_ASSIGNMENT_SUCCESS";
const RECOVERY_NODE_ASSIGNMENT_FAILED: &str = "RECOVERY_NODE_ASSIGNMENT_FAILED";

fn describe_metrics() {
    static INITIALIZER: Once = Once::new();

    INITIALIZER.call_once(|| {
        metrics::describe_counter!(
            RECOVERY_NODE_ASSIGNMENT_RECEIVED,
            "Task assignments observed by this recovery node"
        );
        metrics::describe_counter!(
            RECOVERY_NODE_ASSIGNMENT_SUCCESS,
            "Assignments that ended with a published snapshot and a deleted task"
        );
        metrics::describe_counter!(
            RECOVERY_NODE_ASSIGNMENT_FAILED,
            "Assignments that ended with the task left in place"
        );
    });
}

#[derive(Debug, Default)]
pub struct RecoveryNodeMetrics {
    assignment_received: AtomicU64,
    assignment_success: AtomicU64,
    assignment_failed: AtomicU64,
}

impl RecoveryNodeMetrics {
    pub fn new() -> Self {
        describe_metrics();
        Self::default()
    }

    pub fn record_assignment_received(&self) {
        self.assignment_received.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!(RECOVERY_NODE_ASSIGNMENT_RECEIVED);
    }

    pub fn record_assignment_success(&self) {
        self.assignment_success.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!(RECOVERY_NODE_ASSIGNMENT_SUCCESS);
    }

    pub fn record_assignment_failed(&self) {
        self.assignment_failed.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!(RECOVERY_NODE_ASSIGNMENT_FAILED);
    }

    pub fn assignment_received(&self) -> u64 {
        self.assignment_received.load(Ordering::Relaxed)
    }

    pub fn assignment_success(&self) -> u64 {
        self.assignment_success.load(Ordering::Relaxed)
    }

    pub fn assignment_failed(&self) -> u64 {
        self.assignment_failed.load(Ordering::Relaxed)
    }
}
