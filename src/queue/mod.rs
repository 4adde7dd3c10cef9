// ABOUTME: Work queue and scheduler: admission, durable build records, workers, recovery.
// ABOUTME: At most one non-terminal build per target, previews included.

mod lock;
mod registry;
mod store;
mod work;

pub use lock::{LOCK_FILENAME, LockInfo, QueueLock};
pub use registry::TargetRegistry;
pub use store::{BuildStore, StoreError};
pub use work::{DEFAULT_WORKERS, WorkQueue};

use crate::types::BuildId;
use std::fmt;

/// Result of asking the queue for a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accepted(BuildId),
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Names the build holding the slot.
    AlreadyActive(BuildId),
    UnknownTarget,
    ShuttingDown,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::AlreadyActive(id) => write!(f, "build {} is already active", id),
            RejectReason::UnknownTarget => f.write_str("unknown target"),
            RejectReason::ShuttingDown => f.write_str("queue is shutting down"),
        }
    }
}
