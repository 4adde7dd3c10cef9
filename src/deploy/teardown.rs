// ABOUTME: Removal of preview deployments: containers plus their proxy route.
// ABOUTME: Production containers and other previews are never touched.

use super::labels;
use crate::model::DeploymentTarget;
use crate::proxy::{ProxyClient, ProxyError};
use crate::runtime::{ContainerError, ContainerFilters, ContainerOps, RuntimeError};
use crate::types::PreviewId;
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
    #[error("engine connection failed: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("container teardown failed: {0}")]
    Engine(#[from] ContainerError),

    #[error("proxy route removal failed: {0}")]
    Proxy(#[from] ProxyError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub preview: Option<PreviewId>,
    pub removed: Vec<String>,
}

/// Stop and remove the containers of one preview and delete its route.
pub async fn teardown_preview<R: ContainerOps + ?Sized>(
    runtime: &R,
    proxy: &ProxyClient,
    target: &DeploymentTarget,
    preview: PreviewId,
    stop_timeout: Duration,
) -> Result<TeardownReport, TeardownError> {
    let filters = ContainerFilters {
        labels: labels::deployment_filter(&target.id, Some(preview)),
        network: Some(target.engine.network.clone()),
        all: true,
        ..Default::default()
    };

    let mut removed = Vec::new();
    for container in runtime.list_containers(&filters).await? {
        if !labels::belongs_to(&container.labels, &target.id, Some(preview)) {
            continue;
        }
        runtime.teardown(&container.id, stop_timeout).await?;
        tracing::info!(container = %container.name, %preview, "Removed preview container");
        removed.push(container.name);
    }

    let backend = target.deployment_name(Some(preview));
    let domain = target.domain_for(Some(preview));
    proxy
        .remove_route(&backend, domain.as_ref().map(|d| d.host()))
        .await?;

    Ok(TeardownReport {
        preview: Some(preview),
        removed,
    })
}

/// Tear down every preview of `target`; returns the preview ids removed.
pub async fn teardown_all_previews<R: ContainerOps + ?Sized>(
    runtime: &R,
    proxy: &ProxyClient,
    target: &DeploymentTarget,
    stop_timeout: Duration,
) -> Result<Vec<PreviewId>, TeardownError> {
    let prefix = format!("{}-", target.id);
    let previews: BTreeSet<PreviewId> = runtime
        .list_by_label_prefix(&target.engine.network, labels::DEPLOYMENT, &prefix)
        .await?
        .iter()
        .filter(|c| c.labels.get(labels::TARGET).is_some_and(|t| t == target.id.as_str()))
        .filter_map(|c| labels::preview_of(&c.labels))
        .collect();

    for preview in &previews {
        teardown_preview(runtime, proxy, target, *preview, stop_timeout).await?;
    }

    Ok(previews.into_iter().collect())
}
