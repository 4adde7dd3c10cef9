// ABOUTME: Fetching target sources into a build workspace and running shell commands there.
// ABOUTME: Git checkout with optional GitHub App installation tokens.

mod command;
mod git;
pub mod github;

pub use command::{CommandOutput, CommandRunner, CommandSpec, ShellRunner};
pub use git::GitFetcher;
pub use github::{InstallationTokens, app_jwt};

use crate::model::SourceBinding;
use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {operation} failed (exit {exit_code}): {output}")]
    Git {
        operation: &'static str,
        exit_code: i32,
        output: String,
    },

    #[error("invalid GitHub App key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),

    #[error("installation token request failed: {0}")]
    TokenRequest(#[from] reqwest::Error),

    #[error("installation token rejected ({status}): {body}")]
    TokenRejected { status: u16, body: String },
}

/// What a fetch produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchedSource {
    pub commit: Option<String>,
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Check out `binding` into `dest`, which must not exist yet.
    async fn fetch(&self, binding: &SourceBinding, dest: &Path) -> Result<FetchedSource, SourceError>;
}
