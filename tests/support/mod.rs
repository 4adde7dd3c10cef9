// ABOUTME: Test support utilities.
// ABOUTME: In-memory engine, data plane and collaborators wired into pipeline services.

// Each test binary only uses some of these helpers.
#![allow(dead_code)]

pub mod collaborators;
pub mod engine;
pub mod proxy;

pub use collaborators::{COMMIT, FakeFetcher, FakeIssuer, FakeRunner};
pub use engine::{FakeConnector, FakeEngine};
pub use proxy::{FakeDataPlane, ProxySnapshot};

use deckhand::acme::CertificateLedger;
use deckhand::config::{ReadinessConfig, RestartPolicy, StageTimeouts};
use deckhand::logs::MemoryLogSink;
use deckhand::model::{BuildPack, DeploymentTarget, EngineBinding, SourceBinding, Stage};
use deckhand::pipeline::{
    BuildRequest, CancelSignal, Pipeline, PipelineOutcome, PipelineSettings, Services,
};
use deckhand::proxy::ProxyClient;
use deckhand::types::{BuildId, Domain, PreviewId, TargetId};
use deckhand::workspace::Workspace;
use parking_lot::Mutex;
use std::sync::{Arc, Once};
use std::time::Duration;
use tempfile::TempDir;

pub const NETWORK: &str = "deckhand";
pub const FRONTEND: &str = "http-in";

/// Bound on each fake Data Plane request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(250);

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("deckhand=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A static site target with an HTTPS domain.
pub fn static_target(name: &str) -> DeploymentTarget {
    let mut target = DeploymentTarget::new(
        TargetId::new(name).unwrap(),
        EngineBinding::local(NETWORK),
        BuildPack::Static,
    );
    target.source = Some(SourceBinding::new(format!("acme/{}", name), "main"));
    target.domain = Some(Domain::parse(&format!("https://{}.example.com", name)).unwrap());
    target.ensure_fingerprint();
    target
}

/// Settings with a fast readiness probe.
pub fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        readiness: ReadinessConfig {
            attempts: 3,
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(1),
            path: None,
            command: None,
        },
        timeouts: StageTimeouts {
            stop: Duration::from_secs(1),
            ..StageTimeouts::default()
        },
        restart: RestartPolicy::Always,
        retain: 3,
        renew_after: Duration::from_secs(60 * 24 * 60 * 60),
    }
}

/// Every collaborator of the pipeline, faked, over a temporary directory.
pub struct Harness {
    pub dir: TempDir,
    pub engine: Arc<FakeEngine>,
    pub plane: Arc<FakeDataPlane>,
    pub issuer: Arc<FakeIssuer>,
    pub fetcher: Arc<FakeFetcher>,
    pub runner: Arc<FakeRunner>,
    pub logs: Arc<MemoryLogSink>,
    pub services: Arc<Services>,
    pub settings: PipelineSettings,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_fetcher(FakeFetcher::static_site())
    }

    pub fn with_fetcher(fetcher: FakeFetcher) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new();
        let plane = FakeDataPlane::new();
        let issuer = Arc::new(FakeIssuer::new());
        let fetcher = Arc::new(fetcher);
        let runner = Arc::new(FakeRunner::new());
        let logs = Arc::new(MemoryLogSink::new());

        let services = Arc::new(Services {
            engines: Arc::new(FakeConnector::new(Arc::clone(&engine))),
            proxy: ProxyClient::new(plane.clone(), FRONTEND).with_request_timeout(REQUEST_TIMEOUT),
            certificates: issuer.clone(),
            ledger: Arc::new(CertificateLedger::open(dir.path().join("certificates.json")).unwrap()),
            logs: logs.clone(),
            sources: fetcher.clone(),
            commands: runner.clone(),
            workspace: Workspace::new(dir.path().join("workspaces")),
        });

        Self {
            dir,
            engine,
            plane,
            issuer,
            fetcher,
            runner,
            logs,
            services,
            settings: fast_settings(),
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(Arc::clone(&self.services), self.settings.clone())
    }

    /// Run one build to completion, returning its id, outcome and stages entered.
    pub async fn deploy(
        &self,
        target: &DeploymentTarget,
        preview: Option<PreviewId>,
    ) -> (BuildId, PipelineOutcome, Vec<Stage>) {
        self.deploy_with(target, preview, CancelSignal::never()).await
    }

    pub async fn deploy_with(
        &self,
        target: &DeploymentTarget,
        preview: Option<PreviewId>,
        cancel: CancelSignal,
    ) -> (BuildId, PipelineOutcome, Vec<Stage>) {
        let request = BuildRequest {
            build: BuildId::generate(),
            target: target.clone(),
            preview,
        };
        let stages = Mutex::new(Vec::new());
        let observer = |stage: Stage| stages.lock().push(stage);
        let outcome = self.pipeline().run(&request, cancel, &observer).await;
        (request.build, outcome, stages.into_inner())
    }

    pub fn proxy(&self) -> ProxySnapshot {
        self.plane.snapshot()
    }
}
