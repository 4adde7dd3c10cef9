// ABOUTME: Engine connection error types with SNAFU pattern.
// ABOUTME: Distinguishes client construction failures from unreachable engines.

use snafu::Snafu;

/// Failure to obtain a working engine client for an endpoint.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("cannot create engine client for {endpoint}: {source}"))]
    Client {
        endpoint: String,
        source: bollard::errors::Error,
    },

    #[snafu(display("engine at {endpoint} did not answer: {source}"))]
    Ping {
        endpoint: String,
        source: bollard::errors::Error,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// Endpoint could not be turned into a client.
    InvalidEndpoint,
    /// Client was created but the engine did not respond.
    Unreachable,
}

impl RuntimeError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Client { .. } => RuntimeErrorKind::InvalidEndpoint,
            RuntimeError::Ping { .. } => RuntimeErrorKind::Unreachable,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            RuntimeError::Client { endpoint, .. } | RuntimeError::Ping { endpoint, .. } => {
                endpoint
            }
        }
    }
}
