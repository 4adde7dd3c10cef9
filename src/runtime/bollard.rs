// ABOUTME: Bollard-based container engine implementation.
// ABOUTME: Talks to Docker over a local socket or a remote TCP endpoint.

use crate::model::EngineEndpoint;
use crate::runtime::error::{ClientSnafu, PingSnafu, RuntimeError};
use crate::runtime::traits::{
    BuildContext, ContainerConfig, ContainerError, ContainerFilters, ContainerInfo, ContainerOps,
    ContainerState, ContainerSummary, ExecConfig, ExecError, ExecOps, ExecResult, ImageError,
    ImageOps, MountKind, NetworkConfig, NetworkError, NetworkOps, RestartPolicyConfig,
};
use crate::types::{ContainerId, NetworkId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::exec::StartExecOptions;
use bollard::models::{
    ContainerCreateBody, EndpointSettings, HostConfig, Mount, MountTypeEnum, RestartPolicy,
    RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    BuildImageOptionsBuilder, CreateContainerOptions, CreateImageOptions, InspectContainerOptions,
    ListContainersOptions, RemoveContainerOptions, StopContainerOptions,
    UploadToContainerOptionsBuilder, WaitContainerOptions,
};
use futures::StreamExt;
use snafu::ResultExt;
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

/// Transport-level failures: the engine never produced an HTTP response.
fn is_unreachable(e: &bollard::errors::Error) -> bool {
    matches!(
        e,
        bollard::errors::Error::IOError { .. }
            | bollard::errors::Error::HyperResponseError { .. }
            | bollard::errors::Error::RequestTimeoutError
    )
}

fn status_of(e: &bollard::errors::Error) -> Option<(u16, &str)> {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => Some((*status_code, message.as_str())),
        _ => None,
    }
}

fn map_container_error(e: bollard::errors::Error) -> ContainerError {
    if is_unreachable(&e) {
        return ContainerError::Unreachable(e.to_string());
    }
    match status_of(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some((409, message)) => ContainerError::AlreadyExists(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) => ContainerError::ImageNotFound(message.to_string()),
        _ => map_container_error(e),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((304, message)) => ContainerError::AlreadyRunning(message.to_string()),
        _ => map_container_error(e),
    }
}

/// 304 (already stopped) and 404 (no such container) both mean the
/// container is not running any more.
fn absorb_stop_error(e: bollard::errors::Error) -> Result<(), ContainerError> {
    match status_of(&e) {
        Some((304, _)) | Some((404, _)) => Ok(()),
        _ => Err(map_container_error(e)),
    }
}

fn absorb_remove_error(e: bollard::errors::Error) -> Result<(), ContainerError> {
    match status_of(&e) {
        Some((404, _)) => Ok(()),
        _ => Err(map_container_error(e)),
    }
}

fn map_image_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    if is_unreachable(&e) {
        return ImageError::Unreachable(e.to_string());
    }
    match status_of(&e) {
        Some((404, _)) => ImageError::NotFound(image_name.to_string()),
        _ => ImageError::PullFailed(format!("{}: {}", image_name, e)),
    }
}

fn map_network_error(e: bollard::errors::Error) -> NetworkError {
    if is_unreachable(&e) {
        return NetworkError::Unreachable(e.to_string());
    }
    match status_of(&e) {
        Some((409, message)) => NetworkError::AlreadyExists(message.to_string()),
        Some((404, message)) => NetworkError::NotFound(message.to_string()),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_exec_error(e: bollard::errors::Error) -> ExecError {
    if is_unreachable(&e) {
        return ExecError::Unreachable(e.to_string());
    }
    match status_of(&e) {
        Some((404, message)) => ExecError::ContainerNotFound(message.to_string()),
        Some((409, message)) => ExecError::ContainerNotRunning(message.to_string()),
        _ => ExecError::Runtime(e.to_string()),
    }
}

fn restart_policy(policy: &RestartPolicyConfig) -> RestartPolicy {
    RestartPolicy {
        name: Some(match policy {
            RestartPolicyConfig::No => RestartPolicyNameEnum::NO,
            RestartPolicyConfig::Always => RestartPolicyNameEnum::ALWAYS,
            RestartPolicyConfig::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
            RestartPolicyConfig::OnFailure { .. } => RestartPolicyNameEnum::ON_FAILURE,
        }),
        maximum_retry_count: match policy {
            RestartPolicyConfig::OnFailure { max_retries } => max_retries.map(|r| r as i64),
            _ => None,
        },
    }
}

// =============================================================================
// BollardEngine
// =============================================================================

/// Container engine implementation using bollard.
pub struct BollardEngine {
    client: Docker,
    endpoint: EngineEndpoint,
}

impl BollardEngine {
    pub fn new(client: Docker, endpoint: EngineEndpoint) -> Self {
        Self { client, endpoint }
    }

    /// Create a client for the endpoint. Does not contact the engine.
    pub fn connect(endpoint: &EngineEndpoint) -> Result<Self, RuntimeError> {
        let client = match endpoint {
            EngineEndpoint::Unix(path) => Docker::connect_with_unix(
                &path.to_string_lossy(),
                120,
                bollard::API_DEFAULT_VERSION,
            ),
            EngineEndpoint::Tcp(addr) => Docker::connect_with_http(
                &format!("http://{}", addr),
                120,
                bollard::API_DEFAULT_VERSION,
            ),
        }
        .context(ClientSnafu {
            endpoint: endpoint.to_string(),
        })?;
        Ok(Self::new(client, endpoint.clone()))
    }

    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.client.ping().await.context(PingSnafu {
            endpoint: self.endpoint.to_string(),
        })?;
        Ok(())
    }

    pub fn endpoint(&self) -> &EngineEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl ImageOps for BollardEngine {
    async fn pull_image(&self, reference: &str) -> Result<(), ImageError> {
        let opts = CreateImageOptions {
            from_image: Some(reference.to_string()),
            ..Default::default()
        };

        // Pull returns a stream of progress updates - consume it
        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| map_image_error(e, reference))?;
        }

        Ok(())
    }

    async fn build_image(&self, context: &BuildContext) -> Result<Vec<String>, ImageError> {
        let opts = BuildImageOptionsBuilder::default()
            .dockerfile(&context.dockerfile)
            .t(&context.tag)
            .rm(true)
            .forcerm(true)
            .build();

        let body = bollard::body_full(bytes::Bytes::from(context.archive.clone()));
        let mut stream = self.client.build_image(opts, None, Some(body));
        let mut output = Vec::new();

        while let Some(item) = stream.next().await {
            let info = match item {
                Ok(info) => info,
                Err(e) if is_unreachable(&e) => return Err(ImageError::Unreachable(e.to_string())),
                Err(e) => return Err(ImageError::BuildFailed(e.to_string())),
            };
            if let Some(detail) = info.error_detail {
                let message = detail.message.unwrap_or_else(|| "unknown build error".to_string());
                return Err(ImageError::BuildFailed(message));
            }
            if let Some(line) = info.stream {
                let line = line.trim_end();
                if !line.is_empty() {
                    output.push(line.to_string());
                }
            }
        }

        Ok(output)
    }
}

#[async_trait]
impl ContainerOps for BollardEngine {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let env: Vec<String> = config
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let mut host_config = HostConfig {
            restart_policy: Some(restart_policy(&config.restart_policy)),
            ..Default::default()
        };

        let mounts: Vec<Mount> = config
            .volumes
            .iter()
            .map(|m| Mount {
                source: Some(m.source.clone()),
                target: Some(m.target.clone()),
                typ: Some(match m.kind {
                    MountKind::Bind => MountTypeEnum::BIND,
                    MountKind::Volume => MountTypeEnum::VOLUME,
                }),
                read_only: Some(m.read_only),
                ..Default::default()
            })
            .collect();
        if !mounts.is_empty() {
            host_config.mounts = Some(mounts);
        }

        if let Some(ref network) = config.network {
            host_config.network_mode = Some(network.clone());
        }

        let networking_config = match &config.network {
            Some(network) if !config.network_aliases.is_empty() => {
                let mut endpoints: HashMap<String, EndpointSettings> = HashMap::new();
                endpoints.insert(
                    network.clone(),
                    EndpointSettings {
                        aliases: Some(config.network_aliases.clone()),
                        ..Default::default()
                    },
                );
                Some(bollard::models::NetworkingConfig {
                    endpoints_config: Some(endpoints),
                })
            }
            _ => None,
        };

        let container_config = ContainerCreateBody {
            image: Some(config.image.clone()),
            env: if env.is_empty() { None } else { Some(env) },
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            cmd: config.command.clone(),
            working_dir: config.working_dir.clone(),
            host_config: Some(host_config),
            exposed_ports: config
                .exposed_port
                .map(|port| vec![format!("{}/tcp", port)]),
            networking_config,
            stop_timeout: config.stop_timeout.map(|d| d.as_secs() as i64),
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(config.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), container_config)
            .await
            .map_err(map_container_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };

        match self.client.stop_container(id.as_str(), Some(opts)).await {
            Ok(()) => Ok(()),
            Err(e) => absorb_stop_error(e),
        }
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        match self.client.remove_container(id.as_str(), Some(opts)).await {
            Ok(()) => Ok(()),
            Err(e) => absorb_remove_error(e),
        }
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_error)?;

        let state = details
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(|s| match s {
                bollard::models::ContainerStateStatusEnum::CREATED => ContainerState::Created,
                bollard::models::ContainerStateStatusEnum::RUNNING => ContainerState::Running,
                bollard::models::ContainerStateStatusEnum::PAUSED => ContainerState::Paused,
                bollard::models::ContainerStateStatusEnum::RESTARTING => ContainerState::Restarting,
                bollard::models::ContainerStateStatusEnum::REMOVING => ContainerState::Removing,
                bollard::models::ContainerStateStatusEnum::EXITED => ContainerState::Exited,
                bollard::models::ContainerStateStatusEnum::DEAD => ContainerState::Dead,
                _ => ContainerState::Exited,
            })
            .unwrap_or(ContainerState::Exited);

        Ok(ContainerInfo {
            id: id.clone(),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: details
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            state,
            labels: details.config.and_then(|c| c.labels).unwrap_or_default(),
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();

        if let Some(ref name) = filters.name {
            filter_map.insert("name".to_string(), vec![name.clone()]);
        }

        if let Some(ref network) = filters.network {
            filter_map.insert("network".to_string(), vec![network.clone()]);
        }

        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        for key in &filters.label_keys {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(key.clone());
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(map_container_error)?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let name = c
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default();

                ContainerSummary {
                    id: ContainerId::new(c.id.unwrap_or_default()),
                    name,
                    image: c.image.unwrap_or_default(),
                    state: c
                        .state
                        .map(|s| format!("{:?}", s).to_lowercase())
                        .unwrap_or_default(),
                    labels: c.labels.unwrap_or_default(),
                }
            })
            .collect())
    }

    async fn upload_archive(
        &self,
        id: &ContainerId,
        path: &str,
        archive: Vec<u8>,
    ) -> Result<(), ContainerError> {
        let opts = UploadToContainerOptionsBuilder::default().path(path).build();

        self.client
            .upload_to_container(
                id.as_str(),
                Some(opts),
                bollard::body_full(bytes::Bytes::from(archive)),
            )
            .await
            .map_err(map_container_error)
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        let mut stream = self
            .client
            .wait_container(id.as_str(), None::<WaitContainerOptions>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // Non-zero exits arrive as an error carrying the code.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(map_container_error(e)),
            None => Err(ContainerError::Runtime(format!(
                "wait for {} ended without a status",
                id
            ))),
        }
    }
}

#[async_trait]
impl NetworkOps for BollardEngine {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        let opts = bollard::models::NetworkCreateRequest {
            name: config.name.clone(),
            driver: config.driver.clone(),
            attachable: if config.attachable { Some(true) } else { None },
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            ..Default::default()
        };

        let response = self
            .client
            .create_network(opts)
            .await
            .map_err(map_network_error)?;

        Ok(NetworkId::new(response.id))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        match self
            .client
            .inspect_network(
                name,
                None::<bollard::query_parameters::InspectNetworkOptions>,
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(map_network_error(e)),
        }
    }
}

#[async_trait]
impl ExecOps for BollardEngine {
    async fn exec(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError> {
        let opts = bollard::models::ExecConfig {
            cmd: Some(config.cmd.clone()),
            env: if config.env.is_empty() {
                None
            } else {
                Some(config.env.clone())
            },
            working_dir: config.working_dir.clone(),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let created = self
            .client
            .create_exec(container.as_str(), opts)
            .await
            .map_err(map_exec_error)?;

        let started = self
            .client
            .start_exec(
                &created.id,
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_exec_error)?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        if let bollard::exec::StartExecResults::Attached { mut output, .. } = started {
            while let Some(item) = output.next().await {
                match item {
                    Ok(bollard::container::LogOutput::StdOut { message }) => {
                        stdout.extend(message);
                    }
                    Ok(bollard::container::LogOutput::StdErr { message }) => {
                        stderr.extend(message);
                    }
                    Ok(_) => {}
                    Err(e) => return Err(ExecError::Failed(e.to_string())),
                }
            }
        }

        let details = self
            .client
            .inspect_exec(&created.id)
            .await
            .map_err(map_exec_error)?;

        Ok(ExecResult {
            exit_code: details.exit_code.unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}
