use std::sync::{
    atomic::{AtomicU64, Ordering},
    Once,
};

/// Counter names are contracts; dashboards and tests key off them.
const MESSAGES_RECEIVED: &str = "MESSAGES_RECEIVED";
const MESSAGES_FAILED: &str = "MESSAGES_FAILED";
const ROLLOVERS_INITIATED: &str = "ROLLOVERS_INITIATED";
const ROLLOVERS_COMPLETED: &str = "ROLLOVERS_COMPLETED";
const ROLLOVERS_FAILED: &str = "ROLLOVERS_FAILED";

fn describe_metrics() {
    static INITIALIZER: Once = Once::new();

    INITIALIZER.call_once(|| {
        metrics::describe_counter!(
            MESSAGES_RECEIVED,
            "Messages parsed and appended to a chunk's local index"
        );
        metrics::describe_counter!(MESSAGES_FAILED, "Messages that failed to parse");
        metrics::describe_counter!(
            ROLLOVERS_INITIATED,
            "Chunk uploads started after a committed local index"
        );
        metrics::describe_counter!(ROLLOVERS_COMPLETED, "Chunk builds completed end to end");
        metrics::describe_counter!(ROLLOVERS_FAILED, "Chunk builds that failed");
    });
}

/// Indexing counters, updated from any thread and mirrored to the `metrics`
/// facade under the contract names.
#[derive(Debug, Default)]
pub struct IndexingMetrics {
    messages_received: AtomicU64,
    messages_failed: AtomicU64,
    rollovers_initiated: AtomicU64,
    rollovers_completed: AtomicU64,
    rollovers_failed: AtomicU64,
}

impl IndexingMetrics {
    pub fn new() -> Self {
        describe_metrics();
        Self::default()
    }

    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!(MESSAGES_RECEIVED);
    }

    pub fn record_message_failed(&self) {
        self.messages_failed.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!(MESSAGES_FAILED);
    }

    pub fn record_rollover_initiated(&self) {
        self.rollovers_initiated.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!(ROLLOVERS_INITIATED);
    }

    pub fn record_rollover_completed(&self) {
        self.rollovers_completed.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!(ROLLOVERS_COMPLETED);
    }

    pub fn record_rollover_failed(&self) {
        self.rollovers_failed.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!(ROLLOVERS_FAILED);
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn messages_failed(&self) -> u64 {
        self.messages_failed.load(Ordering::Relaxed)
    }

    pub fn rollovers_initiated(&self) -> u64 {
        self.rollovers_initiated.load(Ordering::Relaxed)
    }

    pub fn rollovers_completed(&self) -> u64 {
        self.rollovers_completed.load(Ordering::Relaxed)
    }

    pub fn rollovers_failed(&self) -> u64 {
        self.rollovers_failed.load(Ordering::Relaxed)
    }
}
