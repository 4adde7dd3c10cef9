// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state on success.

use crate::proxy::{ProxyClient, ProxyError};
use crate::runtime::{
    ContainerFilters, ContainerOps, ContainerState, ExecConfig, ExecOps, NetworkConfig,
    NetworkError, NetworkOps,
};
use crate::types::{ContainerId, NetworkId};

use super::Deployment;
use super::error::{DeployError, container_error, probe_is_fatal};
use super::labels;
use super::state::{Completed, ContainerStarted, Initialized, Ready, Routed};

/// Result type for transitions that may need rollback on failure.
pub type TransitionResult<T, S> = Result<Deployment<T>, (Deployment<S>, DeployError)>;

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> Deployment<S> {
    fn transition<T>(self, state: T) -> Deployment<T> {
        Deployment {
            plan: self.plan,
            previous: self.previous,
            state,
        }
    }

    /// Stop and remove the new container; previous containers are untouched.
    async fn rollback_new_container<R: ContainerOps + ?Sized>(
        self,
        runtime: &R,
        container: &ContainerId,
    ) -> Result<Deployment<Initialized>, DeployError> {
        tracing::info!(container = %self.plan.container_name, "Rolling back new container");
        runtime
            .teardown(container, self.plan.stop_timeout)
            .await
            .map_err(container_error(DeployError::ContainerRemoveFailed))?;
        Ok(self.transition(Initialized))
    }
}

// =============================================================================
// Initialized -> ContainerStarted
// =============================================================================

impl Deployment<Initialized> {
    /// Record the running containers of the same target and preview.
    pub async fn discover_previous<R: ContainerOps + ?Sized>(
        mut self,
        runtime: &R,
    ) -> Result<Self, DeployError> {
        let filters = ContainerFilters {
            labels: labels::deployment_filter(&self.plan.target, self.plan.preview),
            network: Some(self.plan.network.clone()),
            ..Default::default()
        };
        let containers = runtime
            .list_containers(&filters)
            .await
            .map_err(container_error(DeployError::LookupFailed))?;

        self.previous = containers
            .into_iter()
            .filter(|c| c.is_running())
            .filter(|c| labels::belongs_to(&c.labels, &self.plan.target, self.plan.preview))
            .filter(|c| c.name != self.plan.container_name)
            .collect();
        Ok(self)
    }

    /// Ensure the deployment network exists, creating it if necessary.
    pub async fn ensure_network<R: NetworkOps + ?Sized>(
        &self,
        runtime: &R,
    ) -> Result<NetworkId, DeployError> {
        let name = self.plan.network.clone();
        if runtime.network_exists(&name).await? {
            return Ok(NetworkId::new(name));
        }

        let mut network_labels = std::collections::HashMap::new();
        network_labels.insert(labels::MANAGED.to_string(), "true".to_string());
        let config = NetworkConfig {
            name: name.clone(),
            driver: Some("bridge".to_string()),
            attachable: true,
            labels: network_labels,
        };

        match runtime.create_network(&config).await {
            Ok(id) => Ok(id),
            // Created concurrently between the check and the create.
            Err(NetworkError::AlreadyExists(_)) => Ok(NetworkId::new(name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Create and start the new container from the service definition.
    ///
    /// A container that fails to start is removed before returning.
    #[must_use = "deployment state must be used"]
    pub async fn start_container<R: ContainerOps + ?Sized>(
        self,
        runtime: &R,
    ) -> Result<Deployment<ContainerStarted>, DeployError> {
        let mut config = self
            .plan
            .service_definition()
            .container_configs()
            .into_iter()
            .next()
            .ok_or_else(|| DeployError::ContainerCreateFailed("empty service definition".into()))?;
        config.stop_timeout = Some(self.plan.stop_timeout);

        let container = runtime
            .create_container(&config)
            .await
            .map_err(container_error(DeployError::ContainerCreateFailed))?;

        if let Err(e) = self.prepare_and_start(runtime, &container).await {
            if let Err(cleanup) = runtime.teardown(&container, self.plan.stop_timeout).await {
                tracing::warn!(container = %container, error = %cleanup, "Failed to remove unstarted container");
            }
            return Err(e);
        }

        tracing::info!(container = %self.plan.container_name, "Started new container");
        Ok(self.transition(ContainerStarted { container }))
    }

    async fn prepare_and_start<R: ContainerOps + ?Sized>(
        &self,
        runtime: &R,
        container: &ContainerId,
    ) -> Result<(), DeployError> {
        if let Some(upload) = &self.plan.upload {
            runtime
                .upload_archive(container, &upload.path, upload.archive.clone())
                .await
                .map_err(container_error(DeployError::UploadFailed))?;
        }
        runtime
            .start_container(container)
            .await
            .map_err(container_error(DeployError::ContainerStartFailed))
    }
}

// =============================================================================
// ContainerStarted -> Ready
// =============================================================================

impl Deployment<ContainerStarted> {
    /// Probe the new container until it is ready or attempts run out.
    ///
    /// An attempt passes when the container is running and the in-container
    /// check exits 0. Each attempt is bounded by the readiness timeout.
    ///
    /// # Errors
    ///
    /// Returns `(self, error)` on failure to allow rollback.
    #[must_use = "deployment state must be used"]
    pub async fn wait_ready<R: ContainerOps + ExecOps + ?Sized>(
        self,
        runtime: &R,
    ) -> TransitionResult<Ready, ContainerStarted> {
        let readiness = self.plan.readiness.clone();
        let probe = readiness.probe_command(self.plan.port);
        let container = self.state.container.clone();

        for attempt in 1..=readiness.attempts {
            let outcome = tokio::time::timeout(
                readiness.timeout,
                probe_once(runtime, &container, probe.as_deref()),
            )
            .await;

            match outcome {
                Ok(Ok(true)) => {
                    tracing::info!(container = %self.plan.container_name, attempt, "Container ready");
                    return Ok(self.transition(Ready { container }));
                }
                Ok(Ok(false)) => {
                    tracing::debug!(attempt, "Readiness probe not passing yet");
                }
                Ok(Err(e)) => return Err((self, e)),
                Err(_elapsed) => {
                    tracing::debug!(attempt, "Readiness probe timed out");
                }
            }

            if attempt < readiness.attempts {
                tokio::time::sleep(readiness.interval).await;
            }
        }

        Err((
            self,
            DeployError::ReadinessTimeout {
                attempts: readiness.attempts,
            },
        ))
    }

    #[must_use = "deployment state must be used"]
    pub async fn rollback<R: ContainerOps + ?Sized>(
        self,
        runtime: &R,
    ) -> Result<Deployment<Initialized>, DeployError> {
        let container = self.state.container.clone();
        self.rollback_new_container(runtime, &container).await
    }
}

async fn probe_once<R: ContainerOps + ExecOps + ?Sized>(
    runtime: &R,
    container: &ContainerId,
    command: Option<&str>,
) -> Result<bool, DeployError> {
    let info = match runtime.inspect_container(container).await {
        Ok(info) => info,
        Err(crate::runtime::ContainerError::Unreachable(msg)) => {
            return Err(DeployError::Unreachable(msg));
        }
        Err(_) => return Ok(false),
    };
    if info.state != ContainerState::Running {
        return Ok(false);
    }

    let Some(command) = command else {
        return Ok(true);
    };

    match runtime.exec(container, &ExecConfig::shell(command)).await {
        Ok(result) => Ok(result.exit_code == 0),
        Err(e) if probe_is_fatal(&e) => Err(DeployError::Unreachable(e.to_string())),
        Err(e) => {
            tracing::debug!(error = %e, "Readiness exec failed");
            Ok(false)
        }
    }
}

// =============================================================================
// Ready -> Routed
// =============================================================================

impl Deployment<Ready> {
    /// Point the proxy at the new container in one committed transaction.
    ///
    /// Replaces the deployment's backend with the new server, ensures the
    /// host switching rule and reconciles the force-SSL redirect. Deployments
    /// without a domain or port are not routed.
    ///
    /// # Errors
    ///
    /// Returns `(self, error)` on failure to allow rollback.
    #[must_use = "deployment state must be used"]
    pub async fn route(self, proxy: &ProxyClient) -> TransitionResult<Routed, Ready> {
        let container = self.state.container.clone();
        let (Some(domain), Some(server)) = (self.plan.domain.clone(), self.plan.server()) else {
            tracing::info!(deployment = %self.plan.deployment, "No domain or port, skipping routing");
            return Ok(self.transition(Routed { container }));
        };

        let host = domain.host();
        let backend = self.plan.deployment.as_str();
        let server = &server;
        let force_ssl = self.plan.force_ssl;

        // A commit with no answer may still have landed; the backend shows it.
        let committed = || async move {
            let servers = proxy.servers(backend).await?;
            Ok::<_, ProxyError>(matches!(
                servers.as_slice(),
                [only] if only.name == server.name && only.address == server.address
            ))
        };
        let result = proxy
            .apply_confirmed(
                |tx| async move {
                    tx.replace_backend(backend, server).await?;
                    tx.ensure_switching_rule(host, backend).await?;
                    if force_ssl {
                        tx.ensure_force_ssl(host).await
                    } else {
                        tx.remove_force_ssl(host).await
                    }
                },
                committed,
            )
            .await;

        match result {
            Ok(()) => {
                tracing::info!(backend, host, "Routed traffic to new container");
                Ok(self.transition(Routed { container }))
            }
            Err(e) => Err((self, e.into())),
        }
    }

    #[must_use = "deployment state must be used"]
    pub async fn rollback<R: ContainerOps + ?Sized>(
        self,
        runtime: &R,
    ) -> Result<Deployment<Initialized>, DeployError> {
        let container = self.state.container.clone();
        self.rollback_new_container(runtime, &container).await
    }
}

// =============================================================================
// Routed -> Completed
// =============================================================================

impl Deployment<Routed> {
    /// Stop and remove the previous containers.
    ///
    /// Runs only after a committed route. Failures are reported as leftovers
    /// rather than errors since the new deployment already serves.
    pub async fn retire_previous<R: ContainerOps + ?Sized>(self, runtime: &R) -> Deployment<Completed> {
        let mut retired = Vec::new();
        let mut leftover = Vec::new();

        for previous in &self.previous {
            match runtime.teardown(&previous.id, self.plan.stop_timeout).await {
                Ok(()) => {
                    tracing::info!(container = %previous.name, "Retired previous container");
                    retired.push(previous.name.clone());
                }
                Err(e) => {
                    tracing::warn!(container = %previous.name, error = %e, "Failed to retire previous container");
                    leftover.push(previous.name.clone());
                }
            }
        }

        let container = self.state.container.clone();
        self.transition(Completed {
            container,
            retired,
            leftover,
        })
    }
}
