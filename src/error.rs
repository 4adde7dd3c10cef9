// ABOUTME: Application-wide error types for deckhand.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("target '{target}' references unknown engine '{engine}'")]
    UnknownEngine { target: String, engine: String },

    #[error("target '{target}' references unknown source '{source_name}'")]
    UnknownSource { target: String, source_name: String },

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("build not found: {0}")]
    BuildNotFound(String),

    #[error("build rejected: {0}")]
    Rejected(String),

    #[error("build {build} failed: {reason}")]
    BuildFailed { build: String, reason: String },

    #[error("target '{0}' has no domain")]
    NoDomain(String),

    #[error("build store error: {0}")]
    Store(#[from] crate::queue::StoreError),

    #[error("log error: {0}")]
    Log(#[from] crate::logs::LogError),

    #[error("engine connection error: {0}")]
    Runtime(#[from] crate::runtime::RuntimeError),

    #[error("proxy error: {0}")]
    Proxy(#[from] crate::proxy::ProxyError),

    #[error("certificate error: {0}")]
    Certificate(#[from] crate::acme::IssueError),

    #[error("source error: {0}")]
    Source(#[from] crate::source::SourceError),

    #[error("teardown error: {0}")]
    Teardown(#[from] crate::deploy::TeardownError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
