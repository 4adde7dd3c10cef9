// ABOUTME: Container engine entries of the configuration.
// ABOUTME: Accepts a bare endpoint string or a detailed mapping.

use crate::model::{EngineBinding, LOCAL_SOCKET};
use serde::Deserialize;

pub const DEFAULT_NETWORK: &str = "deckhand";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default)]
    pub swarm: bool,
}

fn default_endpoint() -> String {
    LOCAL_SOCKET.to_string()
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            endpoint: default_endpoint(),
            network: default_network(),
            swarm: false,
        }
    }
}

impl EngineConfig {
    pub fn binding(&self, name: &str) -> EngineBinding {
        EngineBinding {
            name: name.to_string(),
            endpoint: self.endpoint.clone(),
            network: self.network.clone(),
            swarm: self.swarm,
        }
    }
}

/// `engines.<name>` may be written as just the endpoint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum EngineEntry {
    Simple(String),
    Detailed(EngineConfig),
}

impl From<EngineEntry> for EngineConfig {
    fn from(entry: EngineEntry) -> Self {
        match entry {
            EngineEntry::Simple(endpoint) => EngineConfig {
                endpoint,
                ..EngineConfig::default()
            },
            EngineEntry::Detailed(config) => config,
        }
    }
}
