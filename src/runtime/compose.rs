// ABOUTME: Compose-style service definition for a deployment.
// ABOUTME: Serialized for operators and materialized through the engine API.

use super::traits::{ContainerConfig, RestartPolicyConfig};
use crate::config::RestartPolicy;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const COMPOSE_VERSION: &str = "3.8";
pub const COMPOSE_FILENAME: &str = "docker-compose.yaml";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceDefinition {
    pub version: String,
    pub services: BTreeMap<String, ComposeService>,
    pub networks: BTreeMap<String, ComposeNetwork>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComposeService {
    pub image: String,
    pub container_name: String,
    pub networks: Vec<String>,
    pub restart: RestartPolicy,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expose: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComposeNetwork {
    pub external: bool,
}

impl ServiceDefinition {
    /// A definition with one service on one external network.
    pub fn single(name: impl Into<String>, service: ComposeService, network: &str) -> Self {
        let mut services = BTreeMap::new();
        services.insert(name.into(), service);
        let mut networks = BTreeMap::new();
        networks.insert(network.to_string(), ComposeNetwork { external: true });
        Self {
            version: COMPOSE_VERSION.to_string(),
            services,
            networks,
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Engine create requests, one per service.
    pub fn container_configs(&self) -> Vec<ContainerConfig> {
        self.services
            .values()
            .map(|service| ContainerConfig {
                name: service.container_name.clone(),
                image: service.image.clone(),
                env: service
                    .environment
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<HashMap<_, _>>(),
                labels: service
                    .labels
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<HashMap<_, _>>(),
                command: service.command.clone(),
                restart_policy: RestartPolicyConfig::from(&service.restart),
                exposed_port: service
                    .expose
                    .as_ref()
                    .and_then(|ports| ports.first())
                    .and_then(|p| p.parse().ok()),
                network: service.networks.first().cloned(),
                network_aliases: vec![service.container_name.clone()],
                ..Default::default()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ComposeService {
        ComposeService {
            image: "nginx:stable-alpine".into(),
            container_name: "site-0123abcd".into(),
            networks: vec!["deckhand".into()],
            restart: RestartPolicy::Always,
            labels: BTreeMap::new(),
            environment: BTreeMap::new(),
            command: None,
            expose: Some(vec!["80".into()]),
        }
    }

    #[test]
    fn yaml_has_external_network_and_restart_always() {
        let def = ServiceDefinition::single("site", service(), "deckhand");
        let yaml = def.to_yaml().unwrap();
        assert!(yaml.contains("version: '3.8'") || yaml.contains("version: \"3.8\""));
        assert!(yaml.contains("container_name: site-0123abcd"));
        assert!(yaml.contains("restart: always"));
        assert!(yaml.contains("external: true"));
    }

    #[test]
    fn materializes_container_config() {
        let def = ServiceDefinition::single("site", service(), "deckhand");
        let configs = def.container_configs();
        assert_eq!(configs.len(), 1);
        let c = &configs[0];
        assert_eq!(c.network.as_deref(), Some("deckhand"));
        assert_eq!(c.exposed_port, Some(80));
        assert_eq!(c.restart_policy, RestartPolicyConfig::Always);
    }
}
