// ABOUTME: Error types for deployment operations.
// ABOUTME: Covers network, container, readiness and proxy routing failures.

use crate::proxy::ProxyError;
use crate::runtime::{ContainerError, ExecError, NetworkError};

/// Errors that can occur during deployment state transitions.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The engine could not be reached at all.
    #[error("engine unreachable: {0}")]
    Unreachable(String),

    #[error("network setup failed: {0}")]
    NetworkFailed(String),

    #[error("failed to list containers: {0}")]
    LookupFailed(String),

    #[error("failed to create container: {0}")]
    ContainerCreateFailed(String),

    #[error("failed to copy files into container: {0}")]
    UploadFailed(String),

    #[error("failed to start container: {0}")]
    ContainerStartFailed(String),

    #[error("failed to remove container: {0}")]
    ContainerRemoveFailed(String),

    #[error("container not ready after {attempts} attempts")]
    ReadinessTimeout { attempts: u32 },

    #[error("proxy transaction failed: {0}")]
    Proxy(#[from] ProxyError),
}

impl DeployError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, DeployError::Unreachable(_))
    }
}

/// Map an engine container error, keeping reachability failures distinct.
pub(crate) fn container_error(
    wrap: fn(String) -> DeployError,
) -> impl Fn(ContainerError) -> DeployError {
    move |err| match err {
        ContainerError::Unreachable(msg) => DeployError::Unreachable(msg),
        other => wrap(other.to_string()),
    }
}

impl From<NetworkError> for DeployError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Unreachable(msg) => DeployError::Unreachable(msg),
            other => DeployError::NetworkFailed(other.to_string()),
        }
    }
}

/// Probe failures that end the readiness loop early.
pub(crate) fn probe_is_fatal(err: &ExecError) -> bool {
    matches!(err, ExecError::Unreachable(_))
}
