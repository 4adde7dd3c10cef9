// ABOUTME: Logs command: print a build log, optionally following it to the end.
// ABOUTME: Reads the file log sink by cursor so followers never miss or repeat lines.

use super::context::log_dir;
use deckhand::config::Config;
use deckhand::error::{Error, Result};
use deckhand::logs::{FileLogSink, LogSink};
use deckhand::output::Output;
use deckhand::queue::BuildStore;
use deckhand::types::BuildId;
use std::time::Duration;

pub(super) const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Print lines from `cursor` on and advance it past them.
pub(super) fn print_since(
    sink: &dyn LogSink,
    build: &BuildId,
    cursor: &mut u64,
    output: &Output,
) -> Result<()> {
    for line in sink.read_since(build, *cursor)? {
        output.log_line(&line.render());
        *cursor = line.seq + 1;
    }
    Ok(())
}

pub async fn logs(config: Config, build: String, follow: bool, output: Output) -> Result<()> {
    let build = BuildId::new(build);
    let store = BuildStore::open(&config.state_dir)?;
    if store.get(&build).is_none() {
        return Err(Error::BuildNotFound(build.to_string()));
    }
    let sink = FileLogSink::new(log_dir(&config.state_dir))?;

    let mut cursor = 0;
    print_since(&sink, &build, &mut cursor, &output)?;
    if !follow {
        return Ok(());
    }

    loop {
        let finished = store.refresh(&build)?.is_none_or(|run| run.is_terminal());
        print_since(&sink, &build, &mut cursor, &output)?;
        if finished {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}
