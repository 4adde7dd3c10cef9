// ABOUTME: Everything a deployment needs to know about the container it creates.
// ABOUTME: Names, labels, image, readiness and routing for one build.

use super::labels;
use crate::config::{ReadinessConfig, RestartPolicy};
use crate::model::DeploymentTarget;
use crate::proxy::Server;
use crate::runtime::{ComposeService, ServiceDefinition};
use crate::types::{BuildId, ContainerId, Domain, PreviewId, TargetId};
use std::collections::BTreeMap;
use std::time::Duration;

/// Files copied into the container before it starts.
#[derive(Debug, Clone)]
pub struct ContainerUpload {
    pub path: String,
    pub archive: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    pub target: TargetId,
    pub preview: Option<PreviewId>,
    pub build: BuildId,
    /// Backend name and label namespace.
    pub deployment: String,
    pub container_name: String,
    pub network: String,
    pub image: String,
    pub command: Option<Vec<String>>,
    pub env: BTreeMap<String, String>,
    pub port: Option<u16>,
    pub upload: Option<ContainerUpload>,
    pub restart: RestartPolicy,
    pub readiness: ReadinessConfig,
    pub stop_timeout: Duration,
    pub domain: Option<Domain>,
    pub force_ssl: bool,
}

impl DeploymentPlan {
    pub fn new(
        target: &DeploymentTarget,
        preview: Option<PreviewId>,
        build: &BuildId,
        image: impl Into<String>,
    ) -> Self {
        Self {
            target: target.id.clone(),
            preview,
            build: build.clone(),
            deployment: target.deployment_name(preview),
            container_name: target.container_name(preview, build),
            network: target.engine.network.clone(),
            image: image.into(),
            command: None,
            env: target.env.clone(),
            port: target.effective_port(),
            upload: None,
            restart: RestartPolicy::Always,
            readiness: ReadinessConfig::default(),
            stop_timeout: Duration::from_secs(10),
            domain: target.domain_for(preview),
            force_ssl: target.force_ssl,
        }
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        labels::for_build(&self.target, self.preview, &self.build, &self.deployment)
    }

    /// Compose-style definition of the deployment's single service.
    pub fn service_definition(&self) -> ServiceDefinition {
        let service = ComposeService {
            image: self.image.clone(),
            container_name: self.container_name.clone(),
            networks: vec![self.network.clone()],
            restart: self.restart.clone(),
            labels: self.labels(),
            environment: self.env.clone(),
            command: self.command.clone(),
            expose: self.port.map(|p| vec![p.to_string()]),
        };
        ServiceDefinition::single(self.deployment.clone(), service, &self.network)
    }

    /// The new container addressed by name, valid before its id is known.
    pub fn container_ref(&self) -> ContainerId {
        ContainerId::new(self.container_name.clone())
    }

    /// Proxy server entry for the new container, when it exposes a port.
    pub fn server(&self) -> Option<Server> {
        self.port
            .map(|port| Server::new(&self.container_name, &self.container_name, port))
    }
}
