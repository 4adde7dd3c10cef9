// ABOUTME: Build pipeline: ordered stages from source checkout to a routed, secured container.
// ABOUTME: Owns stage timeouts, cancellation and the mapping of failures to reason codes.

pub mod artifact;
mod cancel;
mod error;
mod run;
mod services;

pub use artifact::{Artifact, GENERATED_DOCKERFILE, ImageSource, PreparedArtifact};
pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use error::PipelineError;
pub use run::{BuildRequest, DeploySummary, Pipeline, PipelineOutcome, StageObserver};
pub use services::{PipelineSettings, Services};
