// ABOUTME: Best-effort logger bound to one build.
// ABOUTME: Sink failures are counted and traced but never returned.

use super::LogSink;
use crate::types::{BuildId, TargetId};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct BuildLog {
    sink: Arc<dyn LogSink>,
    build: BuildId,
    target: TargetId,
    failures: AtomicUsize,
}

impl BuildLog {
    pub fn new(sink: Arc<dyn LogSink>, build: BuildId, target: TargetId) -> Self {
        Self {
            sink,
            build,
            target,
            failures: AtomicUsize::new(0),
        }
    }

    pub fn build(&self) -> &BuildId {
        &self.build
    }

    pub fn line(&self, text: impl AsRef<str>) {
        let text = text.as_ref();
        tracing::info!(build = %self.build, target = %self.target, "{}", text);
        if let Err(e) = self.sink.append(&self.build, &self.target, text) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(build = %self.build, error = %e, "Failed to write build log line");
        }
    }

    /// Every line of a multi-line blob, such as captured command output.
    pub fn lines(&self, blob: &str) {
        for line in blob.lines().filter(|l| !l.trim().is_empty()) {
            self.line(line);
        }
    }

    /// Lines the sink refused.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}
