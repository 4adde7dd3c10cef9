// ABOUTME: Status command: list build records, optionally of one target.
// ABOUTME: Reads the build store directly; no queue needs to be running.

use deckhand::config::Config;
use deckhand::error::{Error, Result};
use deckhand::output::Output;
use deckhand::queue::BuildStore;
use deckhand::types::TargetId;

pub fn status(config: Config, target: Option<TargetId>, output: Output) -> Result<()> {
    if let Some(id) = &target
        && !config.targets.contains_key(id)
    {
        return Err(Error::UnknownTarget(id.to_string()));
    }
    let store = BuildStore::open(&config.state_dir)?;
    output.builds(&store.list(target.as_ref()));
    Ok(())
}
