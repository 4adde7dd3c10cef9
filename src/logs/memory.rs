// ABOUTME: In-memory log sink for tests and embedding.
// ABOUTME: Same ordering guarantees as the file sink.

use super::{LogError, LogLine, LogSink, Sequencer};
use crate::types::{BuildId, TargetId};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryLogSink {
    builds: Mutex<HashMap<BuildId, (Sequencer, Vec<LogLine>)>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Texts of every line of `build`, in order.
    pub fn texts(&self, build: &BuildId) -> Vec<String> {
        self.builds
            .lock()
            .get(build)
            .map(|(_, lines)| lines.iter().map(|l| l.text.clone()).collect())
            .unwrap_or_default()
    }
}

impl LogSink for MemoryLogSink {
    fn append(&self, build: &BuildId, target: &TargetId, text: &str) -> Result<LogLine, LogError> {
        let mut builds = self.builds.lock();
        let (sequencer, lines) = builds.entry(build.clone()).or_default();
        let (seq, timestamp) = sequencer.next(Utc::now());
        let line = LogLine {
            build: build.clone(),
            target: target.clone(),
            seq,
            timestamp,
            text: text.to_string(),
        };
        lines.push(line.clone());
        Ok(line)
    }

    fn read_since(&self, build: &BuildId, cursor: u64) -> Result<Vec<LogLine>, LogError> {
        Ok(self
            .builds
            .lock()
            .get(build)
            .map(|(_, lines)| lines.iter().filter(|l| l.seq >= cursor).cloned().collect())
            .unwrap_or_default())
    }
}
