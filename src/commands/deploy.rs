// ABOUTME: Deploy command implementation.
// ABOUTME: Queues a build and runs it in-process, or hands it to a running queue.

use super::context::AppContext;
use super::logs::{POLL_INTERVAL, print_since};
use deckhand::error::{Error, Result};
use deckhand::model::{BuildRun, BuildStatus, DeploymentTarget};
use deckhand::output::Output;
use deckhand::queue::{Admission, BuildStore, QueueLock, WorkQueue};
use deckhand::types::{BuildId, PreviewId, TargetId};

pub async fn deploy(
    ctx: AppContext,
    target: TargetId,
    preview: Option<PreviewId>,
    follow: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let deployment_target = ctx.target(&target)?;
    let name = deployment_target.deployment_name(preview);

    if deployment_target.has_config_drift() {
        output.warning(&format!(
            "configuration of {} changed since its fingerprint was recorded",
            target
        ));
    }

    // A running queue owns execution; just leave the record for it.
    if QueueLock::is_held(ctx.state_dir()) {
        let store = ctx.store()?;
        let id = admit(&store, &target, preview, &deployment_target)?;
        output.progress(&format!("Queued build {} of {} for the running queue", id, name));
        if !follow {
            output.success(&id.to_string());
            return Ok(());
        }
        let run = follow_store(&ctx, &store, &id, &output).await?;
        return report(run, &name, &output);
    }

    let _lock = QueueLock::acquire(ctx.state_dir(), false)?;
    let store = ctx.store()?;
    let queue = WorkQueue::start(
        ctx.config.queue.workers,
        ctx.pipeline(),
        store,
        ctx.registry.clone(),
    )?;

    let id = match queue.enqueue(&target, preview)? {
        Admission::Accepted(id) => id,
        Admission::Rejected(reason) => {
            queue.shutdown().await;
            return Err(Error::Rejected(reason.to_string()));
        }
    };
    output.progress(&format!("Deploying {} (build {})", name, id));

    let run = wait_in_process(&ctx, &queue, &id, follow, &output).await;
    queue.shutdown().await;
    let run = run?;
    report(run, &name, &output)
}

fn admit(
    store: &BuildStore,
    target: &TargetId,
    preview: Option<PreviewId>,
    deployment_target: &DeploymentTarget,
) -> Result<BuildId> {
    match store.admit(target, preview, deployment_target.config_hash.clone())? {
        Admission::Accepted(id) => Ok(id),
        Admission::Rejected(reason) => Err(Error::Rejected(reason.to_string())),
    }
}

/// Wait for a build of our own queue, cancelling it on Ctrl-C.
async fn wait_in_process(
    ctx: &AppContext,
    queue: &WorkQueue,
    id: &BuildId,
    follow: bool,
    output: &Output,
) -> Result<BuildRun> {
    let sink = ctx.services.logs.as_ref();
    let mut cursor = 0;
    let wait = queue.wait(id);
    tokio::pin!(wait);
    let mut interrupted = false;

    loop {
        tokio::select! {
            run = &mut wait => {
                if follow {
                    print_since(sink, id, &mut cursor, output)?;
                }
                return run.ok_or_else(|| Error::BuildNotFound(id.to_string()));
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                output.warning("Interrupted, cancelling build");
                queue.cancel(id)?;
            }
            _ = tokio::time::sleep(POLL_INTERVAL), if follow => {
                print_since(sink, id, &mut cursor, output)?;
            }
        }
    }
}

/// Follow a build run by another process until it finishes.
async fn follow_store(
    ctx: &AppContext,
    store: &BuildStore,
    id: &BuildId,
    output: &Output,
) -> Result<BuildRun> {
    let sink = ctx.services.logs.as_ref();
    let mut cursor = 0;
    loop {
        let run = store
            .refresh(id)?
            .ok_or_else(|| Error::BuildNotFound(id.to_string()))?;
        print_since(sink, id, &mut cursor, output)?;
        if run.is_terminal() {
            return Ok(run);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn report(run: BuildRun, name: &str, output: &Output) -> Result<()> {
    match run.status {
        BuildStatus::Succeeded => {
            output.success(&format!("Deployed {} (build {})", name, run.id));
            Ok(())
        }
        _ => Err(Error::BuildFailed {
            build: run.id.to_string(),
            reason: run
                .reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| run.status.to_string()),
        }),
    }
}
