use kaldb_basic_types::Offset;
use serde::{Deserialize, Serialize};

/// Request to rebuild a bounded offset range that an indexer failed to cover
/// in real time. Tasks are immutable once written; the recovery worker that
/// completes one deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryTask {
    pub name: String,
    pub partition_id: String,
    /// Inclusive.
    pub start_offset: Offset,
    /// Inclusive. Invariant: `start_offset <= end_offset`.
    pub end_offset: Offset,
    pub created_at_ms: i64,
}

impl RecoveryTask {
    pub fn new(
        name: impl Into<String>,
        partition_id: impl Into<String>,
        start_offset: Offset,
        end_offset: Offset,
        created_at_ms: i64,
    ) -> Self {
        assert!(
            start_offset <= end_offset,
            "recovery task start offset {start_offset} exceeds end offset {end_offset}"
        );
        Self {
            name: name.into(),
            partition_id: partition_id.into(),
            start_offset,
            end_offset,
            created_at_ms,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum RecoveryNodeState {
    Free,
    Assigned,
    Recovering,
}

/// Coordination entry for one recovery worker process. Exists for the
/// lifetime of the process; deleted on graceful shutdown.
///
/// Only the manager moves an entry FREE -> ASSIGNED; only the owning node
/// moves it ASSIGNED -> RECOVERING -> FREE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryNode {
    pub name: String,
    pub state: RecoveryNodeState,
    /// Name of the assigned recovery task; empty iff `state` is FREE.
    pub recovery_task_name: String,
    pub updated_at_ms: i64,
}

impl RecoveryNode {
    pub fn free(name: impl Into<String>, updated_at_ms: i64) -> Self {
        Self {
            name: name.into(),
            state: RecoveryNodeState::Free,
            recovery_task_name: String::new(),
            updated_at_ms,
        }
    }

    pub fn assigned(&self, task_name: impl Into<String>, updated_at_ms: i64) -> Self {
        Self {
            name: self.name.clone(),
            state: RecoveryNodeState::Assigned,
            recovery_task_name: task_name.into(),
            updated_at_ms,
        }
    }

    pub fn recovering(&self, updated_at_ms: i64) -> Self {
        Self {
            name: self.name.clone(),
            state: RecoveryNodeState::Recovering,
            recovery_task_name: self.recovery_task_name.clone(),
            updated_at_ms,
        }
    }

    pub fn is_free(&self) -> bool {
        self.state == RecoveryNodeState::Free
    }
}
