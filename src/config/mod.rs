// ABOUTME: Configuration types and parsing for deckhand.yml.
// ABOUTME: Handles YAML parsing, env-backed secrets, and target resolution.

mod deserialize;
mod engine;
mod env_value;
mod init;
mod readiness;
mod restart_policy;
mod timeouts;

pub use engine::{DEFAULT_NETWORK, EngineConfig};
pub use env_value::{EnvValue, resolve_env_map};
pub use init::init_config;
pub use readiness::ReadinessConfig;
pub use restart_policy::RestartPolicy;
pub use timeouts::StageTimeouts;

use crate::error::{Error, Result};
use crate::model::{
    BuildPack, ConfigFingerprint, DEFAULT_API_URL, DEFAULT_HTML_URL, DeploymentTarget, GithubApp,
    SourceBinding,
};
use crate::types::{Domain, TargetId};
use deserialize::{deserialize_domain_option, deserialize_engines};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "deckhand.yml";
pub const CONFIG_FILENAME_ALT: &str = "deckhand.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".deckhand/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    pub proxy: ProxyConfig,

    #[serde(default)]
    pub acme: AcmeConfig,

    #[serde(default)]
    pub readiness: ReadinessConfig,

    #[serde(default)]
    pub timeouts: StageTimeouts,

    #[serde(default)]
    pub restart: RestartPolicy,

    #[serde(default, deserialize_with = "deserialize_engines")]
    pub engines: HashMap<String, EngineConfig>,

    #[serde(default)]
    pub sources: HashMap<String, SourceConfig>,

    #[serde(default)]
    pub targets: HashMap<TargetId, TargetConfig>,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".deckhand/state")
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
    /// Workspaces kept per target after a successful build.
    #[serde(default = "default_retain")]
    pub retain: usize,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("/tmp/build-sources")
}

fn default_retain() -> usize {
    3
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        WorkspaceConfig {
            root: default_workspace_root(),
            retain: default_retain(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    2
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Data Plane API base URL, e.g. `http://haproxy:5555`.
    pub url: String,
    #[serde(default = "default_proxy_user")]
    pub username: String,
    pub password: EnvValue,
    #[serde(default = "default_frontend")]
    pub frontend: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

fn default_proxy_user() -> String {
    "admin".to_string()
}

fn default_frontend() -> String {
    "http".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcmeConfig {
    /// Engine that runs the certbot container; defaults to "local".
    #[serde(default = "default_acme_engine")]
    pub engine: String,
    #[serde(default = "default_certbot_image")]
    pub image: String,
    #[serde(default = "default_certbot_volume")]
    pub volume: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub staging: bool,
    /// Certificates younger than this are not renewed.
    #[serde(default = "default_renew_after", with = "humantime_serde")]
    pub renew_after: Duration,
}

fn default_acme_engine() -> String {
    "local".to_string()
}

fn default_certbot_image() -> String {
    "certbot/certbot:latest".to_string()
}

fn default_certbot_volume() -> String {
    "deckhand-letsencrypt".to_string()
}

fn default_renew_after() -> Duration {
    Duration::from_secs(60 * 24 * 60 * 60)
}

impl Default for AcmeConfig {
    fn default() -> Self {
        AcmeConfig {
            engine: default_acme_engine(),
            image: default_certbot_image(),
            volume: default_certbot_volume(),
            email: None,
            staging: false,
            renew_after: default_renew_after(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_html_url")]
    pub html_url: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub app: Option<GithubAppConfig>,
}

fn default_html_url() -> String {
    DEFAULT_HTML_URL.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAppConfig {
    pub app_id: String,
    pub installation_id: u64,
    pub private_key: EnvValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Name of an entry under `sources`; plain public git when unset.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_engine_name")]
    pub engine: String,
    pub build_pack: BuildPack,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub install_command: Option<String>,
    #[serde(default)]
    pub build_command: Option<String>,
    #[serde(default)]
    pub start_command: Option<String>,
    #[serde(default)]
    pub base_directory: Option<String>,
    #[serde(default)]
    pub publish_directory: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "deserialize_domain_option")]
    pub domain: Option<Domain>,
    #[serde(default)]
    pub preview_domain: Option<String>,
    #[serde(default)]
    pub force_ssl: bool,
    #[serde(default)]
    pub config_hash: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, EnvValue>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_engine_name() -> String {
    "local".to_string()
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Structural checks that do not need secrets resolved.
    pub fn validate(&self) -> Result<()> {
        if self.queue.workers == 0 {
            return Err(Error::InvalidConfig(
                "queue.workers must be at least 1".to_string(),
            ));
        }
        if self.readiness.attempts == 0 {
            return Err(Error::InvalidConfig(
                "readiness.attempts must be at least 1".to_string(),
            ));
        }

        for (id, target) in &self.targets {
            self.engine(&target.engine).map_err(|_| Error::UnknownEngine {
                target: id.to_string(),
                engine: target.engine.clone(),
            })?;

            if let Some(source) = &target.source
                && !self.sources.contains_key(source)
            {
                return Err(Error::UnknownSource {
                    target: id.to_string(),
                    source_name: source.clone(),
                });
            }

            match target.build_pack {
                BuildPack::Service if target.image.is_none() => {
                    return Err(Error::InvalidConfig(format!(
                        "target '{}' uses the service build pack but has no image",
                        id
                    )));
                }
                BuildPack::Node | BuildPack::Static if target.repository.is_none() => {
                    return Err(Error::InvalidConfig(format!(
                        "target '{}' has no repository",
                        id
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Engine config by name. "local" is implied when not configured.
    pub fn engine(&self, name: &str) -> Result<EngineConfig> {
        match self.engines.get(name) {
            Some(engine) => Ok(engine.clone()),
            None if name == "local" => Ok(EngineConfig::default()),
            None => Err(Error::InvalidConfig(format!("unknown engine: {}", name))),
        }
    }

    pub fn target_ids(&self) -> Vec<TargetId> {
        let mut ids: Vec<TargetId> = self.targets.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Resolve one target into the model, including its secrets.
    pub fn target(&self, id: &TargetId) -> Result<DeploymentTarget> {
        let cfg = self
            .targets
            .get(id)
            .ok_or_else(|| Error::UnknownTarget(id.to_string()))?;

        let engine = self
            .engine(&cfg.engine)
            .map_err(|_| Error::UnknownEngine {
                target: id.to_string(),
                engine: cfg.engine.clone(),
            })?
            .binding(&cfg.engine);

        let source = match &cfg.repository {
            None => None,
            Some(repository) => Some(self.source_binding(id, cfg, repository)?),
        };

        let mut target = DeploymentTarget::new(id.clone(), engine, cfg.build_pack);
        target.source = source;
        target.port = cfg.port;
        target.install_command = cfg.install_command.clone();
        target.build_command = cfg.build_command.clone();
        target.start_command = cfg.start_command.clone();
        target.base_directory = cfg.base_directory.clone();
        target.publish_directory = cfg.publish_directory.clone();
        target.image = cfg.image.clone();
        target.domain = cfg.domain.clone();
        target.preview_domain = cfg.preview_domain.clone();
        target.force_ssl = cfg.force_ssl;
        target.config_hash = cfg.config_hash.clone().map(ConfigFingerprint::from_hex);
        target.env = resolve_env_map(&cfg.env)?;
        Ok(target)
    }

    pub fn deployment_targets(&self) -> Result<Vec<DeploymentTarget>> {
        self.target_ids().iter().map(|id| self.target(id)).collect()
    }

    fn source_binding(
        &self,
        id: &TargetId,
        cfg: &TargetConfig,
        repository: &str,
    ) -> Result<SourceBinding> {
        let mut binding = SourceBinding::new(repository, cfg.branch.clone());
        let Some(name) = &cfg.source else {
            return Ok(binding);
        };
        let source = self.sources.get(name).ok_or_else(|| Error::UnknownSource {
            target: id.to_string(),
            source_name: name.clone(),
        })?;
        binding.html_url = source.html_url.clone();
        binding.api_url = source.api_url.clone();
        if let Some(app) = &source.app {
            binding.app = Some(GithubApp {
                app_id: app.app_id.clone(),
                installation_id: app.installation_id,
                private_key: app.private_key.resolve()?,
            });
        }
        Ok(binding)
    }

    pub fn template() -> &'static str {
        init::TEMPLATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
proxy:
  url: http://haproxy:5555
  password: secret
targets:
  site:
    repository: acme/site
    build_pack: static
    domain: https://site.example.com
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.queue.workers, 2);
        assert_eq!(config.workspace.retain, 3);
        assert_eq!(config.proxy.frontend, "http");
        assert_eq!(config.acme.renew_after, Duration::from_secs(60 * 86400));

        let target = config.target(&TargetId::new("site").unwrap()).unwrap();
        assert_eq!(target.engine.network, DEFAULT_NETWORK);
        assert_eq!(target.source.unwrap().branch, "main");
    }

    #[test]
    fn engines_accept_shorthand() {
        let yaml = format!("{MINIMAL}engines:\n  remote: 10.0.0.9\n");
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.engines["remote"].endpoint, "10.0.0.9");
        assert_eq!(config.engines["remote"].network, DEFAULT_NETWORK);
    }

    #[test]
    fn unknown_engine_is_rejected() {
        let yaml = MINIMAL.replace("build_pack: static", "build_pack: static\n    engine: nowhere");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, Error::UnknownEngine { .. }));
    }

    #[test]
    fn service_target_needs_image() {
        let yaml = r#"
proxy:
  url: http://haproxy:5555
  password: secret
targets:
  db:
    build_pack: service
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn invalid_target_id_is_rejected() {
        let yaml = MINIMAL.replace("  site:", "  Site_1:");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn template_parses() {
        assert!(Config::from_yaml(Config::template()).is_ok());
    }
}
