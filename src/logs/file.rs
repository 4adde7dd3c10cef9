// ABOUTME: Log sink writing one JSON-lines file per build under the state directory.
// ABOUTME: Sequence numbers resume from the file after a restart.

use super::{LogError, LogLine, LogSink, Sequencer};
use crate::types::{BuildId, TargetId};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// `<dir>/<build>.jsonl`, one [`LogLine`] per line.
pub struct FileLogSink {
    dir: PathBuf,
    sequencers: Mutex<HashMap<BuildId, Sequencer>>,
}

impl FileLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, LogError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            sequencers: Mutex::new(HashMap::new()),
        })
    }

    pub fn path_for(&self, build: &BuildId) -> PathBuf {
        self.dir.join(format!("{}.jsonl", build))
    }

    fn read_all(path: &Path) -> Result<Vec<LogLine>, LogError> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            lines.push(serde_json::from_str(&line)?);
        }
        Ok(lines)
    }
}

impl LogSink for FileLogSink {
    fn append(&self, build: &BuildId, target: &TargetId, text: &str) -> Result<LogLine, LogError> {
        let path = self.path_for(build);
        // Held across the write so lines land in seq order.
        let mut sequencers = self.sequencers.lock();

        let sequencer = match sequencers.entry(build.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Sequencer::resume(&Self::read_all(&path)?)),
        };

        let mut probe = sequencer.clone();
        let (seq, timestamp) = probe.next(Utc::now());
        let line = LogLine {
            build: build.clone(),
            target: target.clone(),
            seq,
            timestamp,
            text: text.to_string(),
        };

        let mut json = serde_json::to_string(&line)?;
        json.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(json.as_bytes())?;

        // Only advance once the line is on disk, so a failed write leaves no gap.
        *sequencer = probe;
        Ok(line)
    }

    fn read_since(&self, build: &BuildId, cursor: u64) -> Result<Vec<LogLine>, LogError> {
        let lines = Self::read_all(&self.path_for(build))?;
        Ok(lines.into_iter().filter(|l| l.seq >= cursor).collect())
    }
}
