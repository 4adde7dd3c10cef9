// ABOUTME: Network operations trait for container engines.
// ABOUTME: Check for and create the deployment network.

use super::shared_types::NetworkConfig;
use crate::types::NetworkId;
use async_trait::async_trait;

/// Network operations.
#[async_trait]
pub trait NetworkOps: Send + Sync {
    /// Create a network.
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError>;

    /// Check if a network exists.
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError>;
}

/// Errors from network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("network not found: {0}")]
    NotFound(String),

    #[error("network already exists: {0}")]
    AlreadyExists(String),

    #[error("engine unreachable: {0}")]
    Unreachable(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
