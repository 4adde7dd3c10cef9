// ABOUTME: The build pipeline: fetch, install, build, deploy, route, secure.
// ABOUTME: Stages are bounded by their timeouts and interruptible by cancellation until routing.

use super::artifact::{self, Artifact, ImageSource};
use super::cancel::CancelSignal;
use super::error::PipelineError;
use super::services::{PipelineSettings, Services};
use crate::deploy::{Deployment, DeploymentPlan, cleanup_orphans, detect_orphans};
use crate::diagnostics::{Diagnostics, Warning};
use crate::logs::BuildLog;
use crate::model::{DeploymentTarget, Stage};
use crate::runtime::{COMPOSE_FILENAME, ContainerEngine, ContainerError, ContainerOps, ImageOps};
use crate::source::CommandSpec;
use crate::types::{BuildId, ContainerId, PreviewId};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Lines of failed command output kept in the error.
const OUTPUT_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub build: BuildId,
    pub target: DeploymentTarget,
    pub preview: Option<PreviewId>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeploySummary {
    pub container: String,
    pub image: String,
    pub commit: Option<String>,
    pub domain: Option<String>,
    pub retired: Vec<String>,
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub result: Result<DeploySummary, PipelineError>,
    pub diagnostics: Diagnostics,
}

/// Observer of stage transitions, e.g. to persist them.
pub type StageObserver<'a> = &'a (dyn Fn(Stage) + Send + Sync);

struct Checkout {
    dir: PathBuf,
    workdir: Option<PathBuf>,
    commit: Option<String>,
}

/// Mutable state of one run.
struct RunState<'a> {
    log: &'a BuildLog,
    cancel: CancelSignal,
    on_stage: StageObserver<'a>,
    diagnostics: Diagnostics,
    engine: Option<Arc<dyn ContainerEngine>>,
    /// New container not yet routed; removed if the run fails.
    unrouted: Option<ContainerId>,
}

impl RunState<'_> {
    fn enter(&self, stage: Stage) {
        (self.on_stage)(stage);
        self.log.line(format!("Stage {}", stage));
    }
}

pub struct Pipeline {
    services: Arc<Services>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(services: Arc<Services>, settings: PipelineSettings) -> Self {
        Self { services, settings }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one build to a terminal outcome.
    ///
    /// On failure a started but unrouted container is removed; containers of
    /// earlier builds are never touched.
    pub async fn run(
        &self,
        request: &BuildRequest,
        cancel: CancelSignal,
        on_stage: StageObserver<'_>,
    ) -> PipelineOutcome {
        let log = BuildLog::new(
            Arc::clone(&self.services.logs),
            request.build.clone(),
            request.target.id.clone(),
        );
        let mut state = RunState {
            log: &log,
            cancel,
            on_stage,
            diagnostics: Diagnostics::default(),
            engine: None,
            unrouted: None,
        };

        match &request.preview {
            Some(preview) => log.line(format!(
                "Build {} of {} (preview {})",
                request.build, request.target.id, preview
            )),
            None => log.line(format!("Build {} of {}", request.build, request.target.id)),
        }

        let result = self.execute(request, &mut state).await;

        match &result {
            Ok(summary) => log.line(format!("Build succeeded: {}", summary.container)),
            Err(e) => {
                log.line(format!("Build failed: {}", e));
                self.remove_unrouted(&mut state).await;
            }
        }

        let mut diagnostics = state.diagnostics;
        if log.failures() > 0 {
            diagnostics.warn(Warning::log_write(log.failures()));
        }
        PipelineOutcome {
            result,
            diagnostics,
        }
    }

    /// Run `fut` under the stage timeout, abandoning it on cancellation.
    async fn guarded<T>(
        &self,
        cancel: &CancelSignal,
        stage: Stage,
        fut: impl Future<Output = Result<T, PipelineError>>,
    ) -> Result<T, PipelineError> {
        let limit = self.settings.timeouts.for_stage(stage);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            outcome = tokio::time::timeout(limit, fut) => match outcome {
                Ok(result) => result,
                Err(_) => Err(PipelineError::StageTimeout { stage }),
            },
        }
    }

    /// Run `fut` under the stage timeout only.
    async fn bounded<T>(
        &self,
        stage: Stage,
        fut: impl Future<Output = Result<T, PipelineError>>,
    ) -> Result<T, PipelineError> {
        let limit = self.settings.timeouts.for_stage(stage);
        tokio::time::timeout(limit, fut)
            .await
            .unwrap_or(Err(PipelineError::StageTimeout { stage }))
    }

    async fn execute(
        &self,
        request: &BuildRequest,
        state: &mut RunState<'_>,
    ) -> Result<DeploySummary, PipelineError> {
        let target = &request.target;

        // fetching
        state.enter(Stage::Fetching);
        let checkout = self
            .guarded(&state.cancel, Stage::Fetching, self.fetch(request, state.log))
            .await?;

        // installing
        state.enter(Stage::Installing);
        if let (Some(cmd), Some(workdir)) = (target.install_command(), &checkout.workdir) {
            let spec = CommandSpec::shell(cmd, workdir).envs(&target.env);
            self.guarded(&state.cancel, Stage::Installing, self.run_command(spec, state.log))
                .await?;
        } else {
            state.log.line("No install command");
        }

        // building
        state.enter(Stage::Building);
        if let (Some(cmd), Some(workdir)) = (target.build_command(), &checkout.workdir) {
            let spec = CommandSpec::shell(cmd, workdir).envs(&target.env);
            self.guarded(&state.cancel, Stage::Building, self.run_command(spec, state.log))
                .await?;
        }
        let artifact = self.build_artifact(request, &checkout, state).await?;

        // deploying
        state.enter(Stage::Deploying);
        let engine = self.engine(&request.target, state, Stage::Deploying).await?;
        let plan = self.plan(request, &artifact);
        self.write_service_definition(&checkout.dir, &plan, state);

        state.unrouted = Some(plan.container_ref());
        let log = state.log;
        let started = self
            .guarded(&state.cancel, Stage::Deploying, async {
                if artifact.source == ImageSource::Pull {
                    log.line(format!("Pulling {}", artifact.image));
                    engine.pull_image(&artifact.image).await?;
                }
                let deployment = Deployment::new(plan);
                deployment.ensure_network(engine.as_ref()).await?;
                let deployment = deployment.discover_previous(engine.as_ref()).await?;
                for previous in deployment.previous() {
                    log.line(format!("Previous container {} keeps serving", previous.name));
                }
                let started = deployment.start_container(engine.as_ref()).await?;
                log.line(format!("Started {}", started.plan().container_name));
                Ok::<_, PipelineError>(started)
            })
            .await?;
        state.unrouted = Some(started.new_container().clone());

        let probed = self
            .guarded(&state.cancel, Stage::Deploying, async {
                Ok::<_, PipelineError>(started.wait_ready(engine.as_ref()).await)
            })
            .await?;
        let ready = match probed {
            Ok(ready) => ready,
            Err((started, e)) => {
                log.line(format!("Container not ready: {}", e));
                if started.rollback(engine.as_ref()).await.is_ok() {
                    log.line("Removed new container, previous left serving");
                    state.unrouted = None;
                }
                return Err(e.into());
            }
        };
        log.line("Container ready");

        // routing: not cancellable, and not abandoned from outside either. The
        // proxy client bounds each request and settles an unanswered commit
        // before reporting.
        state.enter(Stage::Routing);
        let routed = match ready.route(&self.services.proxy).await {
            Ok(routed) => routed,
            Err((ready, e)) => {
                log.line(format!("Routing failed: {}", e));
                if ready.rollback(engine.as_ref()).await.is_ok() {
                    log.line("Removed new container, previous left serving");
                    state.unrouted = None;
                }
                return Err(e.into());
            }
        };
        state.unrouted = None;
        let plan = routed.plan().clone();
        if let Some(domain) = &plan.domain {
            log.line(format!("Routed {} to {}", domain, plan.container_name));
        }

        let mut retired = Vec::new();
        match self
            .bounded(Stage::Routing, async {
                Ok::<_, PipelineError>(routed.retire_previous(engine.as_ref()).await)
            })
            .await
        {
            Ok(completed) => {
                for name in completed.retired() {
                    log.line(format!("Retired {}", name));
                }
                for name in completed.leftover() {
                    state
                        .diagnostics
                        .warn(Warning::cleanup(format!("previous container {} was not removed", name)));
                }
                retired = completed.retired().to_vec();
            }
            Err(e) => {
                // Routed already; previous containers are left for the orphan sweep.
                log.line(format!("Retiring previous containers: {}", e));
                state
                    .diagnostics
                    .warn(Warning::cleanup(format!("retiring previous containers: {}", e)));
            }
        }

        // securing
        state.enter(Stage::Securing);
        self.secure(request, &plan, state).await;

        self.finish(request, &plan, &engine, state).await;

        let mut summary = self.summary(&checkout, &artifact, request, &plan);
        summary.retired = retired;
        Ok(summary)
    }

    fn summary(
        &self,
        checkout: &Checkout,
        artifact: &Artifact,
        request: &BuildRequest,
        plan: &DeploymentPlan,
    ) -> DeploySummary {
        DeploySummary {
            container: plan.container_name.clone(),
            image: artifact.image.clone(),
            commit: checkout.commit.clone(),
            domain: request
                .target
                .domain_for(request.preview)
                .map(|d| d.to_string()),
            retired: Vec::new(),
        }
    }

    async fn fetch(&self, request: &BuildRequest, log: &BuildLog) -> Result<Checkout, PipelineError> {
        let target = &request.target;
        let dir = self
            .services
            .workspace
            .create(&target.id, &request.build)
            .map_err(|e| PipelineError::Workspace(e.to_string()))?;

        if !target.build_pack.needs_source() {
            std::fs::create_dir_all(&dir).map_err(|e| PipelineError::Workspace(e.to_string()))?;
            log.line(format!("No source to fetch for {} build pack", target.build_pack));
            return Ok(Checkout {
                dir,
                workdir: None,
                commit: None,
            });
        }

        let source = target.source.as_ref().ok_or_else(|| {
            PipelineError::InputRejected(format!("target {} has no repository", target.id))
        })?;
        log.line(format!("Cloning {} ({})", source.repository, source.branch));
        let fetched = self
            .services
            .sources
            .fetch(source, &dir)
            .await?;
        if let Some(commit) = &fetched.commit {
            log.line(format!("Checked out {}", commit));
        }

        let workdir = match &target.base_directory {
            Some(base) => dir.join(base.trim_start_matches('/')),
            None => dir.clone(),
        };
        if !workdir.is_dir() {
            return Err(PipelineError::InputRejected(format!(
                "base directory {} not found in repository",
                target.base_directory.as_deref().unwrap_or("/")
            )));
        }

        Ok(Checkout {
            dir,
            workdir: Some(workdir),
            commit: fetched.commit,
        })
    }

    async fn run_command(&self, spec: CommandSpec, log: &BuildLog) -> Result<(), PipelineError> {
        let command = spec.display();
        log.line(format!("$ {}", command));
        let out = self
            .services
            .commands
            .run(&spec)
            .await
            .map_err(|e| PipelineError::CommandFailed {
                command: command.clone(),
                exit_code: -1,
                output: e.to_string(),
            })?;
        log.lines(&out.output);

        if out.success() {
            return Ok(());
        }
        let lines: Vec<&str> = out.output.lines().collect();
        let tail = lines[lines.len().saturating_sub(OUTPUT_TAIL_LINES)..].join("\n");
        Err(PipelineError::CommandFailed {
            command,
            exit_code: out.exit_code,
            output: tail,
        })
    }

    async fn build_artifact(
        &self,
        request: &BuildRequest,
        checkout: &Checkout,
        state: &mut RunState<'_>,
    ) -> Result<Artifact, PipelineError> {
        let target = request.target.clone();
        let build = request.build.clone();
        let workdir = checkout.workdir.clone();
        let prepared = self
            .guarded(&state.cancel, Stage::Building, async move {
                tokio::task::spawn_blocking(move || {
                    artifact::prepare(&target, &build, workdir.as_deref())
                })
                .await
                .map_err(|e| PipelineError::Workspace(format!("artifact task failed: {}", e)))?
            })
            .await?;

        if let Some(context) = prepared.build {
            let engine = self.engine(&request.target, state, Stage::Building).await?;
            let log = state.log;
            log.line(format!("Building image {}", context.tag));
            let output = self
                .guarded(&state.cancel, Stage::Building, async {
                    Ok::<_, PipelineError>(engine.build_image(&context).await?)
                })
                .await?;
            for line in output {
                log.lines(&line);
            }
        }

        Ok(prepared.artifact)
    }

    /// Connected engine of the target, connecting on first use.
    async fn engine(
        &self,
        target: &DeploymentTarget,
        state: &mut RunState<'_>,
        stage: Stage,
    ) -> Result<Arc<dyn ContainerEngine>, PipelineError> {
        if let Some(engine) = &state.engine {
            return Ok(Arc::clone(engine));
        }
        let engines = &self.services.engines;
        let engine = self
            .guarded(&state.cancel, stage, async {
                Ok::<_, PipelineError>(engines.connect(&target.engine).await?)
            })
            .await?;
        state.engine = Some(Arc::clone(&engine));
        Ok(engine)
    }

    fn plan(&self, request: &BuildRequest, artifact: &Artifact) -> DeploymentPlan {
        let mut plan = DeploymentPlan::new(
            &request.target,
            request.preview,
            &request.build,
            artifact.image.clone(),
        );
        plan.command = artifact.command.clone();
        plan.upload = artifact.upload.clone();
        plan.restart = self.settings.restart.clone();
        plan.readiness = self.settings.readiness.clone();
        plan.stop_timeout = self.settings.timeouts.stop;
        plan
    }

    fn write_service_definition(&self, dir: &Path, plan: &DeploymentPlan, state: &mut RunState<'_>) {
        let written = plan
            .service_definition()
            .to_yaml()
            .map_err(|e| e.to_string())
            .and_then(|yaml| {
                std::fs::write(dir.join(COMPOSE_FILENAME), yaml).map_err(|e| e.to_string())
            });
        if let Err(e) = written {
            state
                .diagnostics
                .warn(Warning::cleanup(format!("writing {}: {}", COMPOSE_FILENAME, e)));
        }
    }

    async fn secure(&self, request: &BuildRequest, plan: &DeploymentPlan, state: &mut RunState<'_>) {
        let Some(domain) = plan.domain.as_ref().filter(|d| d.is_https()) else {
            state.log.line("No HTTPS domain, skipping certificate");
            return;
        };
        let host = domain.host();
        let ledger = &self.services.ledger;
        if ledger.valid_for(host, Utc::now(), self.settings.renew_after) {
            state.log.line(format!("Certificate for {} still valid", host));
            return;
        }

        state.log.line(format!("Requesting certificate for {}", host));
        let issued = self
            .bounded(Stage::Securing, async {
                self.services
                    .certificates
                    .issue(domain, &request.target.id)
                    .await
                    .map_err(|e| PipelineError::CertificateIssuanceFailed(e.to_string()))
            })
            .await;

        match issued {
            Ok(certificate) => {
                state.log.line(format!("Certificate issued for {}", host));
                if let Err(e) = ledger.record(&certificate) {
                    state
                        .diagnostics
                        .warn(Warning::certificate(format!("recording certificate: {}", e)));
                }
            }
            Err(e) => {
                state.log.line(format!("Certificate not issued: {}", e));
                state.diagnostics.warn(Warning::certificate(e.to_string()));
            }
        }
    }

    /// Workspace retention and orphan cleanup after success.
    async fn finish(
        &self,
        request: &BuildRequest,
        plan: &DeploymentPlan,
        engine: &Arc<dyn ContainerEngine>,
        state: &mut RunState<'_>,
    ) {
        match self
            .services
            .workspace
            .prune(&request.target.id, self.settings.retain)
        {
            Ok(removed) if !removed.is_empty() => {
                state
                    .log
                    .line(format!("Removed {} old workspace(s)", removed.len()));
            }
            Ok(_) => {}
            Err(e) => state
                .diagnostics
                .warn(Warning::cleanup(format!("pruning workspaces: {}", e))),
        }

        let sweep = async {
            let orphans = detect_orphans(
                engine.as_ref(),
                &plan.target,
                plan.preview,
                &plan.network,
                &[plan.container_name.as_str()],
            )
            .await?;
            Ok::<_, ContainerError>(
                cleanup_orphans(engine.as_ref(), &orphans, plan.stop_timeout).await,
            )
        };
        match tokio::time::timeout(self.settings.timeouts.deploy, sweep).await {
            Ok(Ok(result)) => {
                for name in &result.removed {
                    state.log.line(format!("Removed orphaned container {}", name));
                }
                for failure in result.failures {
                    state.diagnostics.warn(Warning::cleanup(format!(
                        "orphaned container {}: {}",
                        failure.container, failure.error
                    )));
                }
            }
            Ok(Err(e)) => state
                .diagnostics
                .warn(Warning::cleanup(format!("listing orphaned containers: {}", e))),
            Err(_) => state
                .diagnostics
                .warn(Warning::cleanup("orphan cleanup timed out")),
        }
    }

    async fn remove_unrouted(&self, state: &mut RunState<'_>) {
        let (Some(engine), Some(container)) = (state.engine.clone(), state.unrouted.take()) else {
            return;
        };
        let teardown = engine.teardown(&container, self.settings.timeouts.stop);
        match tokio::time::timeout(self.settings.timeouts.deploy, teardown).await {
            Ok(Ok(())) => state.log.line(format!("Removed new container {}", container)),
            Ok(Err(e)) => state
                .diagnostics
                .warn(Warning::cleanup(format!("removing new container {}: {}", container, e))),
            Err(_) => state
                .diagnostics
                .warn(Warning::cleanup(format!("removing new container {} timed out", container))),
        }
    }
}
