// ABOUTME: Append-only, ordered log lines per build, readable by cursor.
// ABOUTME: File-backed JSON lines sink, in-memory sink, and a best-effort build logger.

mod build_log;
mod file;
mod memory;

pub use build_log::BuildLog;
pub use file::FileLogSink;
pub use memory::MemoryLogSink;

use crate::types::{BuildId, TargetId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed log line: {0}")]
    Json(#[from] serde_json::Error),
}

/// One line of build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub build: BuildId,
    pub target: TargetId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl LogLine {
    /// `HH:MM:SS.mmm text`
    pub fn render(&self) -> String {
        format!("{} {}", self.timestamp.format("%H:%M:%S%.3f"), self.text)
    }
}

/// Storage for build logs.
///
/// Lines of one build get consecutive `seq` numbers starting at 0 and
/// non-decreasing timestamps.
pub trait LogSink: Send + Sync {
    fn append(&self, build: &BuildId, target: &TargetId, text: &str) -> Result<LogLine, LogError>;

    /// Lines with `seq >= cursor`, in order.
    fn read_since(&self, build: &BuildId, cursor: u64) -> Result<Vec<LogLine>, LogError>;
}

/// Next position of one build's log.
#[derive(Debug, Clone, Default)]
pub(crate) struct Sequencer {
    next_seq: u64,
    last: Option<DateTime<Utc>>,
}

impl Sequencer {
    pub(crate) fn resume(lines: &[LogLine]) -> Self {
        Self {
            next_seq: lines.last().map(|l| l.seq + 1).unwrap_or(0),
            last: lines.iter().map(|l| l.timestamp).max(),
        }
    }

    pub(crate) fn next(&mut self, now: DateTime<Utc>) -> (u64, DateTime<Utc>) {
        let timestamp = match self.last {
            Some(last) if last > now => last,
            _ => now,
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.last = Some(timestamp);
        (seq, timestamp)
    }
}
