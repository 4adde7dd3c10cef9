// ABOUTME: Run command: hold the queue lock and process builds until Ctrl-C.
// ABOUTME: Picks up builds and cancel requests written by other deckhand processes.

use super::context::AppContext;
use super::logs::POLL_INTERVAL;
use deckhand::error::Result;
use deckhand::output::Output;
use deckhand::queue::{QueueLock, WorkQueue};

pub async fn run(ctx: AppContext, force: bool, output: Output) -> Result<()> {
    let lock = QueueLock::acquire(ctx.state_dir(), force)?;
    let queue = WorkQueue::start(
        ctx.config.queue.workers,
        ctx.pipeline(),
        ctx.store()?,
        ctx.registry.clone(),
    )?;
    output.progress(&format!(
        "Queue running with {} worker(s) as pid {} (Ctrl-C to stop)",
        ctx.config.queue.workers,
        lock.info().pid
    ));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(POLL_INTERVAL) => {
                if let Err(e) = poll(&queue, &output) {
                    output.warning(&e.to_string());
                }
            }
        }
    }

    output.progress("Stopping, waiting for running builds");
    queue.shutdown().await;
    drop(lock);
    output.success("Queue stopped");
    Ok(())
}

fn poll(queue: &WorkQueue, output: &Output) -> Result<()> {
    for id in queue.sync()? {
        output.progress(&format!("Picked up build {}", id));
    }
    for id in queue.store().take_cancel_requests()? {
        if queue.cancel(&id)? {
            output.progress(&format!("Cancelled build {}", id));
        }
    }
    Ok(())
}
