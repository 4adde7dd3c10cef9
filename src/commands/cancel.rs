// ABOUTME: Cancel command: stop a queued or running build.
// ABOUTME: Signals the running queue through the store, or fails the record directly.

use deckhand::config::Config;
use deckhand::error::{Error, Result};
use deckhand::model::ReasonCode;
use deckhand::output::Output;
use deckhand::queue::{BuildStore, QueueLock};
use deckhand::types::BuildId;

pub fn cancel(config: Config, build: String, output: Output) -> Result<()> {
    let id = BuildId::new(build);
    let store = BuildStore::open(&config.state_dir)?;
    let run = store
        .get(&id)
        .ok_or_else(|| Error::BuildNotFound(id.to_string()))?;

    if run.is_terminal() {
        output.success(&format!("Build {} already {}", id, run.status));
        return Ok(());
    }

    if QueueLock::is_held(&config.state_dir) {
        store.request_cancel(&id)?;
        output.success(&format!("Cancellation of build {} requested", id));
        return Ok(());
    }

    // Nobody runs the queue, so nothing else can touch the record.
    store.update(&id, |r| r.fail(ReasonCode::Cancelled))?;
    output.success(&format!("Build {} cancelled", id));
    Ok(())
}
