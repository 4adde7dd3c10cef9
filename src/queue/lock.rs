// ABOUTME: Single-runner lock for the work queue, held as <state_dir>/queue.lock.
// ABOUTME: Atomic create-new with holder info; stale locks of dead local processes are broken.

use super::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const LOCK_FILENAME: &str = "queue.lock";

/// Who runs the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl LockInfo {
    pub fn current() -> Self {
        Self {
            holder: local_host(),
            pid: std::process::id(),
            started_at: Utc::now(),
        }
    }

    /// A lock left behind by a process on this host that no longer exists.
    pub fn is_stale(&self) -> bool {
        self.holder == local_host() && !process_alive(self.pid)
    }
}

pub fn local_host() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

fn process_alive(pid: u32) -> bool {
    if cfg!(target_os = "linux") {
        Path::new("/proc").join(pid.to_string()).exists()
    } else {
        true
    }
}

/// Held queue lock; released on drop.
#[derive(Debug)]
pub struct QueueLock {
    path: PathBuf,
    info: LockInfo,
}

impl QueueLock {
    pub fn path_in(state_dir: &Path) -> PathBuf {
        state_dir.join(LOCK_FILENAME)
    }

    /// Take the lock, breaking it first if stale or if `force` is set.
    pub fn acquire(state_dir: &Path, force: bool) -> Result<Self, StoreError> {
        fs::create_dir_all(state_dir).map_err(|source| StoreError::Io {
            path: state_dir.to_path_buf(),
            source,
        })?;
        let path = Self::path_in(state_dir);
        let info = LockInfo::current();

        match Self::create(&path, &info) {
            Ok(()) => return Ok(Self { path, info }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(source) => return Err(StoreError::Io { path, source }),
        }

        match Self::holder(state_dir) {
            Some(existing) if !force && !existing.is_stale() => {
                return Err(StoreError::LockHeld {
                    holder: existing.holder,
                    pid: existing.pid,
                    since: existing.started_at,
                });
            }
            Some(existing) => tracing::warn!(
                holder = %existing.holder,
                pid = existing.pid,
                since = %existing.started_at,
                "Breaking queue lock"
            ),
            None => tracing::warn!("Queue lock unreadable, breaking it"),
        }

        let _ = fs::remove_file(&path);
        Self::create(&path, &info).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, info })
    }

    fn create(path: &Path, info: &LockInfo) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let json = serde_json::to_vec(info).map_err(io::Error::other)?;
        file.write_all(&json)
    }

    /// Current holder, if the lock exists and is readable.
    pub fn holder(state_dir: &Path) -> Option<LockInfo> {
        let content = fs::read(Self::path_in(state_dir)).ok()?;
        serde_json::from_slice(&content).ok()
    }

    /// Whether a live queue runner holds the lock.
    pub fn is_held(state_dir: &Path) -> bool {
        Self::holder(state_dir).is_some_and(|info| !info.is_stale())
    }

    pub fn info(&self) -> &LockInfo {
        &self.info
    }
}

impl Drop for QueueLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release queue lock");
        }
    }
}
