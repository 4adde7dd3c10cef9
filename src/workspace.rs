// ABOUTME: Per-build workspace directories under <root>/<target>/<build>.
// ABOUTME: Each build owns its directory exclusively; old ones are pruned by age.

use crate::types::{BuildId, TargetId};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("workspace already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("workspace I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> WorkspaceError + '_ {
    move |source| WorkspaceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn target_dir(&self, target: &TargetId) -> PathBuf {
        self.root.join(target.as_str())
    }

    pub fn path_for(&self, target: &TargetId, build: &BuildId) -> PathBuf {
        self.target_dir(target).join(build.as_str())
    }

    /// Reserve the build's directory path.
    ///
    /// The parent is created, the directory itself is left for the checkout
    /// to create. Fails if the path is already taken.
    pub fn create(&self, target: &TargetId, build: &BuildId) -> Result<PathBuf, WorkspaceError> {
        let path = self.path_for(target, build);
        if path.exists() {
            return Err(WorkspaceError::AlreadyExists(path));
        }
        let parent = self.target_dir(target);
        fs::create_dir_all(&parent).map_err(io_error(&parent))?;
        Ok(path)
    }

    pub fn remove(&self, target: &TargetId, build: &BuildId) -> Result<(), WorkspaceError> {
        let path = self.path_for(target, build);
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    /// Remove all but the `keep` most recently modified workspaces of `target`.
    /// Returns the removed paths.
    pub fn prune(&self, target: &TargetId, keep: usize) -> Result<Vec<PathBuf>, WorkspaceError> {
        let dir = self.target_dir(target);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir)(e)),
        };

        let mut workspaces: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_error(&dir))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            workspaces.push((modified, path));
        }

        workspaces.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        let mut removed = Vec::new();
        for (_, path) in workspaces.into_iter().skip(keep) {
            fs::remove_dir_all(&path).map_err(io_error(&path))?;
            tracing::debug!(path = %path.display(), "Pruned workspace");
            removed.push(path);
        }
        Ok(removed)
    }
}
