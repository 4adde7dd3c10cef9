// ABOUTME: Container operations trait for container engines.
// ABOUTME: Create, start, stop, remove, inspect, list, upload and wait.

use super::shared_types::{ContainerConfig, ContainerInfo};
use crate::types::ContainerId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Send + Sync {
    /// Create a container from the given configuration.
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError>;

    /// Start a created container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Stop a running container.
    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError>;

    /// Remove a container.
    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    /// Get detailed information about a container.
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError>;

    /// List containers matching the given filters.
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError>;

    /// Extract a tar archive into `path` inside the container.
    async fn upload_archive(
        &self,
        id: &ContainerId,
        path: &str,
        archive: Vec<u8>,
    ) -> Result<(), ContainerError>;

    /// Block until the container exits and return its exit code.
    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError>;

    /// Containers attached to `network` whose `label` value starts with `prefix`.
    async fn list_by_label_prefix(
        &self,
        network: &str,
        label: &str,
        prefix: &str,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let filters = ContainerFilters {
            network: Some(network.to_string()),
            label_keys: vec![label.to_string()],
            all: true,
            ..Default::default()
        };
        let containers = self.list_containers(&filters).await?;
        Ok(containers
            .into_iter()
            .filter(|c| c.labels.get(label).is_some_and(|v| v.starts_with(prefix)))
            .collect())
    }

    /// Stop and remove a container. A container that is already stopped or
    /// gone counts as torn down.
    async fn teardown(&self, id: &ContainerId, timeout: Duration) -> Result<(), ContainerError> {
        match self.stop_container(id, timeout).await {
            Ok(()) | Err(ContainerError::NotRunning(_)) => {}
            Err(ContainerError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        }
        match self.remove_container(id, true).await {
            Ok(()) | Err(ContainerError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Filter by label (key=value).
    pub labels: HashMap<String, String>,
    /// Filter by label presence.
    pub label_keys: Vec<String>,
    /// Filter by name (supports partial match).
    pub name: Option<String>,
    /// Filter by attached network.
    pub network: Option<String>,
    /// Include stopped containers.
    pub all: bool,
}

/// Summary information about a container.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    /// Current state, e.g. "running" or "exited".
    pub state: String,
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("engine unreachable: {0}")]
    Unreachable(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
