// ABOUTME: Durable build records, one JSON file per build under <state_dir>/builds/.
// ABOUTME: Admission check and record creation share one lock; writes are temp file + rename.

use super::{Admission, RejectReason};
use crate::model::{BuildRun, BuildStatus, ConfigFingerprint, ReasonCode};
use crate::types::{BuildId, PreviewId, TargetId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const RECORD_EXT: &str = "json";
const CANCEL_EXT: &str = "cancel";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("build store I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt build record {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("queue lock held by {holder} (pid {pid}) since {since}")]
    LockHeld {
        holder: String,
        pid: u32,
        since: chrono::DateTime<chrono::Utc>,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Build records indexed in memory and mirrored to disk.
#[derive(Debug)]
pub struct BuildStore {
    dir: PathBuf,
    records: Mutex<HashMap<BuildId, BuildRun>>,
}

impl BuildStore {
    /// Open the store under `<state_dir>/builds`, loading every record.
    pub fn open(state_dir: &Path) -> Result<Self, StoreError> {
        let dir = state_dir.join("builds");
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        let store = Self {
            dir,
            records: Mutex::new(HashMap::new()),
        };
        store.load_new()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &BuildId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, RECORD_EXT))
    }

    fn cancel_path(&self, id: &BuildId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, CANCEL_EXT))
    }

    fn read_record(path: &Path) -> Result<BuildRun, StoreError> {
        let content = fs::read(path).map_err(io_error(path))?;
        serde_json::from_slice(&content).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    fn persist(&self, run: &BuildRun) -> Result<(), StoreError> {
        let path = self.record_path(&run.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(run).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;
        fs::write(&tmp, json).map_err(io_error(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_error(&path))
    }

    /// Index records written by other processes. Returns the ids newly seen.
    pub fn load_new(&self) -> Result<Vec<BuildId>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(io_error(&self.dir))?;
        let mut records = self.records.lock();
        let mut added = Vec::new();

        for entry in entries {
            let path = entry.map_err(io_error(&self.dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            let known = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| records.contains_key(&BuildId::new(stem.to_string())));
            if known {
                continue;
            }
            match Self::read_record(&path) {
                Ok(run) => {
                    added.push(run.id.clone());
                    records.insert(run.id.clone(), run);
                }
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable build record"),
            }
        }
        Ok(added)
    }

    /// Re-read one record from disk, bypassing the index.
    pub fn refresh(&self, id: &BuildId) -> Result<Option<BuildRun>, StoreError> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let run = Self::read_record(&path)?;
        self.records.lock().insert(id.clone(), run.clone());
        Ok(Some(run))
    }

    /// Admit a build of `target`, or of one of its previews, unless any build
    /// of that target is still active.
    ///
    /// The check, the new record and its first write happen under one lock.
    pub fn admit(
        &self,
        target: &TargetId,
        preview: Option<PreviewId>,
        config_hash: Option<ConfigFingerprint>,
    ) -> Result<Admission, StoreError> {
        let mut records = self.records.lock();
        if let Some(active) = records.values().find(|r| r.blocks(target)) {
            return Ok(Admission::Rejected(RejectReason::AlreadyActive(
                active.id.clone(),
            )));
        }

        let mut run = BuildRun::queued(BuildId::generate(), target.clone(), preview);
        run.config_hash = config_hash;
        self.persist(&run)?;
        let id = run.id.clone();
        records.insert(id.clone(), run);
        Ok(Admission::Accepted(id))
    }

    /// Apply `change` to a record and persist it if `change` returns true.
    ///
    /// Returns the record after the change, or `None` for an unknown build.
    pub fn update(
        &self,
        id: &BuildId,
        change: impl FnOnce(&mut BuildRun) -> bool,
    ) -> Result<Option<BuildRun>, StoreError> {
        let mut records = self.records.lock();
        let Some(current) = records.get(id) else {
            return Ok(None);
        };
        let mut next = current.clone();
        if change(&mut next) {
            self.persist(&next)?;
            records.insert(id.clone(), next.clone());
        }
        Ok(Some(next))
    }

    pub fn get(&self, id: &BuildId) -> Option<BuildRun> {
        self.records.lock().get(id).cloned()
    }

    /// Records of one target, or of all targets, oldest first.
    pub fn list(&self, target: Option<&TargetId>) -> Vec<BuildRun> {
        let mut runs: Vec<BuildRun> = self
            .records
            .lock()
            .values()
            .filter(|r| target.is_none_or(|t| &r.target == t))
            .cloned()
            .collect();
        runs.sort_by(|a, b| a.queued_at.cmp(&b.queued_at).then_with(|| a.id.as_str().cmp(b.id.as_str())));
        runs
    }

    /// The non-terminal build holding the target's admission slot, if any.
    pub fn active(&self, target: &TargetId) -> Option<BuildRun> {
        self.records
            .lock()
            .values()
            .find(|r| r.blocks(target))
            .cloned()
    }

    /// Recovery sweep: fail running records as interrupted, fail queued
    /// records of unknown targets, and return the queued builds to redispatch.
    pub fn recover(&self, target_exists: impl Fn(&TargetId) -> bool) -> Result<Vec<BuildId>, StoreError> {
        let mut redispatch = Vec::new();
        for run in self.list(None) {
            match run.status {
                BuildStatus::Running => {
                    tracing::warn!(build = %run.id, target = %run.target, "Marking interrupted build failed");
                    self.update(&run.id, |r| r.fail(ReasonCode::Interrupted))?;
                }
                BuildStatus::Queued if !target_exists(&run.target) => {
                    tracing::warn!(build = %run.id, target = %run.target, "Queued build for unknown target");
                    self.update(&run.id, |r| r.fail(ReasonCode::UnknownTarget))?;
                }
                BuildStatus::Queued => redispatch.push(run.id),
                _ => {}
            }
        }
        Ok(redispatch)
    }

    /// Ask the process running the queue to cancel `id`.
    pub fn request_cancel(&self, id: &BuildId) -> Result<(), StoreError> {
        let path = self.cancel_path(id);
        fs::write(&path, b"").map_err(io_error(&path))
    }

    /// Collect and clear pending cancel requests.
    pub fn take_cancel_requests(&self) -> Result<Vec<BuildId>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(io_error(&self.dir))?;
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_error(&self.dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CANCEL_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(BuildId::new(stem.to_string()));
            }
            fs::remove_file(&path).map_err(io_error(&path))?;
        }
        Ok(ids)
    }
}
