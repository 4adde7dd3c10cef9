// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod domain;
mod id;
mod preview;
mod target_id;

pub use domain::{Domain, DomainError};
pub use id::{BuildId, ContainerId, Id, NetworkId, TransactionId};
pub use preview::PreviewId;
pub use target_id::{TargetId, TargetIdError};
