// ABOUTME: Container cutover using the type state pattern.
// ABOUTME: Start, probe, route, then retire previous containers; preview teardown.

mod deployment;
mod error;
pub mod labels;
mod orphans;
mod plan;
mod state;
mod teardown;
mod transitions;

pub use deployment::Deployment;
pub use error::DeployError;
pub use orphans::{CleanupFailure, CleanupResult, cleanup_orphans, detect_orphans};
pub use plan::{ContainerUpload, DeploymentPlan};
pub use state::{Completed, ContainerStarted, Initialized, Ready, Routed};
pub use teardown::{TeardownError, TeardownReport, teardown_all_previews, teardown_preview};
pub use transitions::TransitionResult;
