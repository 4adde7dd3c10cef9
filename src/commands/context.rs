// ABOUTME: Wires configuration into the services every command shares.
// ABOUTME: Engine connector, proxy client, certificate issuer, log sink and build store.

use deckhand::acme::{CertbotIssuer, CertificateLedger};
use deckhand::config::Config;
use deckhand::error::{Error, Result};
use deckhand::logs::FileLogSink;
use deckhand::model::DeploymentTarget;
use deckhand::pipeline::{Pipeline, PipelineSettings, Services};
use deckhand::proxy::{HttpDataPlane, ProxyClient};
use deckhand::queue::{BuildStore, TargetRegistry};
use deckhand::runtime::{BollardEngineConnector, ContainerEngine, EngineConnector};
use deckhand::source::{GitFetcher, InstallationTokens, ShellRunner};
use deckhand::types::TargetId;
use deckhand::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LEDGER_FILENAME: &str = "certificates.json";

/// Load the configuration from `path` or discover it from the working directory.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover(&std::env::current_dir()?),
    }
}

pub struct AppContext {
    pub config: Config,
    pub services: Arc<Services>,
    pub registry: Arc<TargetRegistry>,
    pub settings: PipelineSettings,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let state_dir = config.state_dir.clone();
        let engines: Arc<dyn EngineConnector> = Arc::new(BollardEngineConnector::new());

        let plane = HttpDataPlane::new(
            &config.proxy.url,
            &config.proxy.username,
            &config.proxy.password.resolve()?,
            config.proxy.request_timeout,
        )?;
        let proxy = ProxyClient::new(Arc::new(plane), config.proxy.frontend.clone())
            .with_request_timeout(config.proxy.request_timeout);

        let acme_binding = config.engine(&config.acme.engine)?.binding(&config.acme.engine);
        let certificates = CertbotIssuer::new(
            Arc::clone(&engines),
            acme_binding,
            config.acme.clone(),
            config.timeouts.stop,
        );

        let runner = Arc::new(ShellRunner);
        let tokens = InstallationTokens::new(config.timeouts.fetch)?;

        let services = Services {
            engines,
            proxy,
            certificates: Arc::new(certificates),
            ledger: Arc::new(CertificateLedger::open(state_dir.join(LEDGER_FILENAME))?),
            logs: Arc::new(FileLogSink::new(log_dir(&state_dir))?),
            sources: Arc::new(GitFetcher::new(runner.clone(), Some(tokens))),
            commands: runner,
            workspace: Workspace::new(config.workspace.root.clone()),
        };

        let registry = Arc::new(TargetRegistry::new(config.deployment_targets()?));
        let settings = PipelineSettings::from_config(&config);

        Ok(Self {
            config,
            services: Arc::new(services),
            registry,
            settings,
        })
    }

    pub fn state_dir(&self) -> &Path {
        &self.config.state_dir
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(Arc::clone(&self.services), self.settings.clone())
    }

    pub fn store(&self) -> Result<Arc<BuildStore>> {
        Ok(Arc::new(BuildStore::open(self.state_dir())?))
    }

    pub fn target(&self, id: &TargetId) -> Result<DeploymentTarget> {
        self.registry
            .get(id)
            .ok_or_else(|| Error::UnknownTarget(id.to_string()))
    }

    pub async fn engine_for(&self, target: &DeploymentTarget) -> Result<Arc<dyn ContainerEngine>> {
        Ok(self.services.engines.connect(&target.engine).await?)
    }
}

pub fn log_dir(state_dir: &Path) -> PathBuf {
    state_dir.join("logs")
}
