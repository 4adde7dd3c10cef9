// ABOUTME: External collaborators and settings shared by every pipeline run.
// ABOUTME: Built once by the application, faked in tests.

use crate::acme::{CertificateIssuer, CertificateLedger};
use crate::config::{Config, ReadinessConfig, RestartPolicy, StageTimeouts};
use crate::logs::LogSink;
use crate::proxy::ProxyClient;
use crate::runtime::EngineConnector;
use crate::source::{CommandRunner, SourceFetcher};
use crate::workspace::Workspace;
use std::sync::Arc;
use std::time::Duration;

pub struct Services {
    pub engines: Arc<dyn EngineConnector>,
    pub proxy: ProxyClient,
    pub certificates: Arc<dyn CertificateIssuer>,
    pub ledger: Arc<CertificateLedger>,
    pub logs: Arc<dyn LogSink>,
    pub sources: Arc<dyn SourceFetcher>,
    pub commands: Arc<dyn CommandRunner>,
    pub workspace: Workspace,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub readiness: ReadinessConfig,
    pub timeouts: StageTimeouts,
    pub restart: RestartPolicy,
    /// Workspaces kept per target after success.
    pub retain: usize,
    pub renew_after: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            readiness: config.readiness.clone(),
            timeouts: config.timeouts.clone(),
            restart: config.restart.clone(),
            retain: config.workspace.retain,
            renew_after: config.acme.renew_after,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            readiness: ReadinessConfig::default(),
            timeouts: StageTimeouts::default(),
            restart: RestartPolicy::Always,
            retain: 3,
            renew_after: Duration::from_secs(60 * 24 * 60 * 60),
        }
    }
}
