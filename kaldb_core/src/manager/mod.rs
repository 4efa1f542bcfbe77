//! Periodic cluster-manager services.

mod recovery_assignment;
mod snapshot_cleaner;

pub use self::{
    recovery_assignment::RecoveryTaskAssignmentService, snapshot_cleaner::SnapshotCleanerService,
};
