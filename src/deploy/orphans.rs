// ABOUTME: Orphan container detection for cleanup.
// ABOUTME: Finds containers of a deployment left behind by interrupted runs.

use super::labels;
use crate::runtime::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
use crate::types::{ContainerId, PreviewId, TargetId};
use std::time::Duration;

/// Detect orphaned containers of one deployment.
///
/// An orphan is a container that:
/// - Is labelled with the target (and the preview, if any)
/// - Sits on the deployment network, running or not
/// - Is not one of the `known` containers (matched by id or name)
pub async fn detect_orphans<R: ContainerOps + ?Sized>(
    runtime: &R,
    target: &TargetId,
    preview: Option<PreviewId>,
    network: &str,
    known: &[&str],
) -> Result<Vec<ContainerSummary>, ContainerError> {
    let filters = ContainerFilters {
        labels: labels::deployment_filter(target, preview),
        network: Some(network.to_string()),
        all: true,
        ..Default::default()
    };

    let containers = runtime.list_containers(&filters).await?;

    Ok(containers
        .into_iter()
        .filter(|c| labels::belongs_to(&c.labels, target, preview))
        .filter(|c| !known.iter().any(|k| *k == c.id.as_str() || *k == c.name))
        .collect())
}

/// A container that could not be cleaned up.
#[derive(Debug)]
pub struct CleanupFailure {
    pub container: String,
    pub error: ContainerError,
}

#[derive(Debug, Default)]
pub struct CleanupResult {
    pub removed: Vec<String>,
    pub failures: Vec<CleanupFailure>,
}

/// Stop and remove every orphan, continuing past failures.
pub async fn cleanup_orphans<R: ContainerOps + ?Sized>(
    runtime: &R,
    orphans: &[ContainerSummary],
    stop_timeout: Duration,
) -> CleanupResult {
    let mut result = CleanupResult::default();

    for orphan in orphans {
        let id: &ContainerId = &orphan.id;
        match runtime.teardown(id, stop_timeout).await {
            Ok(()) => result.removed.push(orphan.name.clone()),
            Err(error) => result.failures.push(CleanupFailure {
                container: orphan.name.clone(),
                error,
            }),
        }
    }

    result
}
