// ABOUTME: Closed set of build pipeline failures and their persisted reason codes.
// ABOUTME: Raw library errors are converted here and never escape the pipeline.

use crate::deploy::DeployError;
use crate::model::{ReasonCode, Stage};
use crate::runtime::{ImageError, RuntimeError};
use crate::source::SourceError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("input rejected: {0}")]
    InputRejected(String),

    #[error("command `{command}` exited with {exit_code}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("engine unreachable: {0}")]
    EngineUnreachable(String),

    #[error("readiness probe failed: {0}")]
    ReadinessTimeout(String),

    #[error("proxy transaction failed: {0}")]
    ProxyTransactionFailed(String),

    /// Reported as a warning only.
    #[error("certificate issuance failed: {0}")]
    CertificateIssuanceFailed(String),

    #[error("stage {stage} timed out")]
    StageTimeout { stage: Stage },

    #[error("build cancelled")]
    Cancelled,

    #[error("engine operation failed: {0}")]
    Engine(String),

    #[error("workspace error: {0}")]
    Workspace(String),
}

impl PipelineError {
    /// Code stored on the failed build; `None` for warning-only errors.
    pub fn reason_code(&self) -> Option<ReasonCode> {
        Some(match self {
            PipelineError::InputRejected(_) => ReasonCode::InputRejected,
            PipelineError::CommandFailed { .. } => ReasonCode::CommandFailed,
            PipelineError::EngineUnreachable(_) => ReasonCode::EngineUnreachable,
            PipelineError::ReadinessTimeout(_) => ReasonCode::ReadinessTimeout,
            PipelineError::ProxyTransactionFailed(_) => ReasonCode::ProxyTransactionFailed,
            PipelineError::CertificateIssuanceFailed(_) => return None,
            PipelineError::StageTimeout { .. } => ReasonCode::StageTimeout,
            PipelineError::Cancelled => ReasonCode::Cancelled,
            PipelineError::Engine(_) => ReasonCode::EngineFailed,
            PipelineError::Workspace(_) => ReasonCode::WorkspaceFailed,
        })
    }

    /// Worth enqueueing again unchanged once the cause is fixed outside deckhand.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            PipelineError::EngineUnreachable(_) | PipelineError::ProxyTransactionFailed(_)
        )
    }
}

impl From<DeployError> for PipelineError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::Unreachable(msg) => PipelineError::EngineUnreachable(msg),
            e @ DeployError::ReadinessTimeout { .. } => PipelineError::ReadinessTimeout(e.to_string()),
            DeployError::Proxy(e) => PipelineError::ProxyTransactionFailed(e.to_string()),
            other => PipelineError::Engine(other.to_string()),
        }
    }
}

impl From<RuntimeError> for PipelineError {
    fn from(err: RuntimeError) -> Self {
        PipelineError::EngineUnreachable(err.to_string())
    }
}

impl From<ImageError> for PipelineError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Unreachable(msg) => PipelineError::EngineUnreachable(msg),
            other => PipelineError::Engine(other.to_string()),
        }
    }
}

impl From<SourceError> for PipelineError {
    fn from(err: SourceError) -> Self {
        PipelineError::InputRejected(err.to_string())
    }
}
