// ABOUTME: Source and engine bindings of a deployment target.
// ABOUTME: Resolves clone URLs and Docker endpoints from configured values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_HTML_URL: &str = "https://github.com";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Path of the local Docker socket.
pub const LOCAL_SOCKET: &str = "/var/run/docker.sock";

/// Port remote engines listen on.
pub const REMOTE_ENGINE_PORT: u16 = 2375;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GithubApp {
    pub app_id: String,
    pub installation_id: u64,
    pub private_key: String,
}

impl fmt::Debug for GithubApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubApp")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceBinding {
    /// `org/repo` on the git host, or a full clone URL or local path.
    pub repository: String,
    pub branch: String,
    pub html_url: String,
    pub api_url: String,
    pub app: Option<GithubApp>,
}

impl SourceBinding {
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            html_url: DEFAULT_HTML_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            app: None,
        }
    }

    /// Clone URL, with an installation token embedded when given.
    pub fn clone_url(&self, token: Option<&str>) -> String {
        if self.repository.contains("://") || self.repository.starts_with('/') {
            return self.repository.clone();
        }

        let base = self.html_url.trim_end_matches('/');
        match (token, base.split_once("://")) {
            (Some(token), Some((scheme, host))) => {
                format!(
                    "{}://x-access-token:{}@{}/{}.git",
                    scheme, token, host, self.repository
                )
            }
            _ => format!("{}/{}.git", base, self.repository),
        }
    }

    /// Repository name, used to namespace workspaces.
    pub fn repository_name(&self) -> &str {
        self.repository
            .trim_end_matches('/')
            .trim_end_matches(".git")
            .rsplit('/')
            .next()
            .unwrap_or(&self.repository)
    }
}

/// How to reach a container engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EngineEndpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl fmt::Display for EngineEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEndpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            EngineEndpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineBinding {
    pub name: String,
    /// Local socket path, `unix://`/`tcp://` URL, or bare remote host.
    pub endpoint: String,
    pub network: String,
    #[serde(default)]
    pub swarm: bool,
}

impl EngineBinding {
    pub fn local(network: impl Into<String>) -> Self {
        Self {
            name: "local".to_string(),
            endpoint: LOCAL_SOCKET.to_string(),
            network: network.into(),
            swarm: false,
        }
    }

    pub fn resolve_endpoint(&self) -> EngineEndpoint {
        let raw = self.endpoint.trim();
        if let Some(path) = raw.strip_prefix("unix://") {
            EngineEndpoint::Unix(PathBuf::from(path))
        } else if let Some(addr) = raw.strip_prefix("tcp://") {
            EngineEndpoint::Tcp(addr.to_string())
        } else if raw.starts_with('/') {
            EngineEndpoint::Unix(PathBuf::from(raw))
        } else if raw.contains(':') {
            EngineEndpoint::Tcp(raw.to_string())
        } else {
            EngineEndpoint::Tcp(format!("{}:{}", raw, REMOTE_ENGINE_PORT))
        }
    }
}
