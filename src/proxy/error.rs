// ABOUTME: Errors from the HAProxy Data Plane API and transaction client.
// ABOUTME: Status-specific variants let callers treat 404 as "already gone".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid data plane URL: {0}")]
    InvalidUrl(String),

    #[error("data plane unreachable: {0}")]
    Unreachable(String),

    #[error("data plane request timed out")]
    Timeout,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("data plane returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected data plane response: {0}")]
    InvalidResponse(String),

    #[error("could not open a proxy transaction: {0}")]
    BeginFailed(String),

    #[error("commit of transaction {transaction} failed: {message}")]
    CommitFailed { transaction: String, message: String },
}

pub type Result<T> = std::result::Result<T, ProxyError>;
