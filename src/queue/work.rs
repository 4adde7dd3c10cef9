// ABOUTME: The work queue: admission, a fixed worker pool, cancellation and shutdown.
// ABOUTME: Workers move records through running to a terminal status around one pipeline run.

use super::lock::local_host;
use super::registry::TargetRegistry;
use super::store::{BuildStore, StoreError};
use super::{Admission, RejectReason};
use crate::model::{BuildRun, BuildStatus, ReasonCode, Stage};
use crate::pipeline::{BuildRequest, CancelHandle, Pipeline, cancel_pair};
use crate::types::{BuildId, PreviewId, TargetId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

pub const DEFAULT_WORKERS: usize = 2;

struct Shared {
    store: Arc<BuildStore>,
    registry: Arc<TargetRegistry>,
    pipeline: Pipeline,
    /// Cancel handles of builds a worker has claimed.
    claimed: Mutex<HashMap<BuildId, CancelHandle>>,
    accepting: AtomicBool,
    finished: Notify,
    host: String,
}

pub struct WorkQueue {
    shared: Arc<Shared>,
    sender: Mutex<Option<mpsc::UnboundedSender<BuildId>>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkQueue {
    /// Run the recovery sweep, then spawn `workers` workers.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(
        workers: usize,
        pipeline: Pipeline,
        store: Arc<BuildStore>,
        registry: Arc<TargetRegistry>,
    ) -> Result<Self, StoreError> {
        let redispatch = store.recover(|target| registry.contains(target))?;

        let shared = Arc::new(Shared {
            store,
            registry,
            pipeline,
            claimed: Mutex::new(HashMap::new()),
            accepting: AtomicBool::new(true),
            finished: Notify::new(),
            host: local_host(),
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let workers = (0..workers.max(1))
            .map(|n| {
                let shared = Arc::clone(&shared);
                let rx = Arc::clone(&rx);
                tokio::spawn(async move { worker(n, shared, rx).await })
            })
            .collect();

        if !redispatch.is_empty() {
            tracing::info!(count = redispatch.len(), "Redispatching queued builds");
        }
        for id in redispatch {
            let _ = tx.send(id);
        }

        Ok(Self {
            shared,
            sender: Mutex::new(Some(tx)),
            workers,
        })
    }

    pub fn store(&self) -> &Arc<BuildStore> {
        &self.shared.store
    }

    pub fn registry(&self) -> &Arc<TargetRegistry> {
        &self.shared.registry
    }

    /// Admit and dispatch a build of `target`.
    pub fn enqueue(
        &self,
        target: &TargetId,
        preview: Option<PreviewId>,
    ) -> Result<Admission, StoreError> {
        if !self.shared.accepting.load(Ordering::SeqCst) {
            return Ok(Admission::Rejected(RejectReason::ShuttingDown));
        }
        let Some(deployment_target) = self.shared.registry.get(target) else {
            return Ok(Admission::Rejected(RejectReason::UnknownTarget));
        };

        let admission = self
            .shared
            .store
            .admit(target, preview, deployment_target.config_hash)?;
        if let Admission::Accepted(id) = &admission {
            tracing::info!(build = %id, target = %target, preview = ?preview, "Build queued");
            self.dispatch(id.clone());
        }
        Ok(admission)
    }

    fn dispatch(&self, id: BuildId) {
        let sent = self
            .sender
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(id.clone()).is_ok());
        if !sent {
            // Stays queued; the next start picks it up.
            tracing::warn!(build = %id, "Queue is shutting down, build left queued");
        }
    }

    /// Dispatch queued builds that other processes wrote to the store.
    ///
    /// A build whose target already has another active build fails as rejected.
    pub fn sync(&self) -> Result<Vec<BuildId>, StoreError> {
        let mut dispatched = Vec::new();
        for id in self.shared.store.load_new()? {
            let Some(run) = self.shared.store.get(&id) else {
                continue;
            };
            if run.is_terminal() {
                continue;
            }
            let contested = self
                .shared
                .store
                .list(Some(&run.target))
                .iter()
                .any(|other| other.id != run.id && other.blocks(&run.target));
            if contested {
                tracing::warn!(build = %id, target = %run.target, "Build raced another admission");
                self.shared
                    .store
                    .update(&id, |r| r.fail(ReasonCode::InputRejected))?;
                continue;
            }
            self.dispatch(id.clone());
            dispatched.push(id);
        }
        Ok(dispatched)
    }

    /// Cancel a build. A queued build fails at once; a running one is signalled
    /// and fails at its next suspension point.
    ///
    /// For a running build this returns as soon as the signal is sent, while
    /// the record is still `running`. Follow with [`WorkQueue::wait`] to see
    /// it `failed`, by which time its new container has been removed.
    ///
    /// Returns false if the build is unknown or already terminal.
    pub fn cancel(&self, id: &BuildId) -> Result<bool, StoreError> {
        let claimed = self.shared.claimed.lock();
        if let Some(handle) = claimed.get(id) {
            tracing::info!(build = %id, "Cancelling running build");
            handle.cancel();
            return Ok(true);
        }

        let mut cancelled = false;
        self.shared.store.update(id, |run| {
            cancelled = run.status == BuildStatus::Queued
                && run.fail(ReasonCode::Cancelled);
            cancelled
        })?;
        drop(claimed);

        if cancelled {
            tracing::info!(build = %id, "Cancelled queued build");
            self.shared.finished.notify_waiters();
        }
        Ok(cancelled)
    }

    /// Wait until `id` reaches a terminal status.
    pub async fn wait(&self, id: &BuildId) -> Option<BuildRun> {
        loop {
            let notified = self.shared.finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let run = self.shared.store.get(id)?;
            if run.is_terminal() {
                return Some(run);
            }
            notified.await;
        }
    }

    /// Stop accepting builds and join the workers after their current build.
    /// Builds still queued stay queued for the next start.
    pub async fn shutdown(self) {
        self.shared.accepting.store(false, Ordering::SeqCst);
        self.sender.lock().take();
        for handle in self.workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Queue worker panicked");
            }
        }
        tracing::info!("Work queue stopped");
    }
}

async fn worker(
    n: usize,
    shared: Arc<Shared>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<BuildId>>>,
) {
    tracing::debug!(worker = n, "Queue worker started");
    loop {
        let next = rx.lock().await.recv().await;
        let Some(id) = next else {
            break;
        };
        if !shared.accepting.load(Ordering::SeqCst) {
            continue;
        }
        if let Err(e) = run_build(&shared, &id).await {
            tracing::error!(worker = n, build = %id, error = %e, "Failed to record build outcome");
        }
        shared.finished.notify_waiters();
    }
    tracing::debug!(worker = n, "Queue worker stopped");
}

async fn run_build(shared: &Shared, id: &BuildId) -> Result<(), StoreError> {
    let Some(run) = shared.store.get(id) else {
        return Ok(());
    };
    let Some(target) = shared.registry.get(&run.target) else {
        shared
            .store
            .update(id, |r| r.fail(ReasonCode::UnknownTarget))?;
        return Ok(());
    };

    let (handle, signal) = cancel_pair();
    {
        let mut claimed = shared.claimed.lock();
        let started = shared
            .store
            .update(id, |r| r.start(shared.host.clone(), std::process::id()))?
            .is_some_and(|r| r.status == BuildStatus::Running);
        if !started {
            // Cancelled or finished before a worker got to it.
            return Ok(());
        }
        claimed.insert(id.clone(), handle);
    }
    tracing::info!(build = %id, target = %run.target, "Build started");

    let request = BuildRequest {
        build: id.clone(),
        target,
        preview: run.preview,
    };
    let store = &shared.store;
    let on_stage = |stage: Stage| {
        if let Err(e) = store.update(id, |r| r.enter_stage(stage)) {
            tracing::warn!(build = %id, stage = %stage, error = %e, "Failed to record stage");
        }
    };
    let outcome = shared.pipeline.run(&request, signal, &on_stage).await;

    shared.claimed.lock().remove(id);

    for warning in outcome.diagnostics.warnings() {
        tracing::warn!(build = %id, kind = ?warning.kind, "{}", warning.message);
    }

    match outcome.result {
        Ok(summary) => {
            shared.store.update(id, |r| r.succeed())?;
            tracing::info!(build = %id, container = %summary.container, "Build succeeded");
        }
        Err(e) => {
            let reason = e.reason_code().unwrap_or(ReasonCode::EngineFailed);
            shared.store.update(id, |r| r.fail(reason))?;
            tracing::warn!(build = %id, reason = %reason, retriable = e.is_retriable(), error = %e, "Build failed");
        }
    }
    Ok(())
}
