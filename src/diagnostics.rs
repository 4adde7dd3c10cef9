// ABOUTME: Diagnostics accumulator for non-fatal warnings during a build.
// ABOUTME: Collects warnings that shouldn't fail a build but should be shown to users.

use serde::Serialize;

/// Collects non-fatal warnings during a build.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during a build.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Certificate could not be issued; the deployment still serves over HTTP.
    pub fn certificate(message: impl Into<String>) -> Self {
        Self::new(WarningKind::CertificateIssuance, message)
    }

    pub fn cleanup(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Cleanup, message)
    }

    pub fn log_write(failures: usize) -> Self {
        Self::new(
            WarningKind::LogWrite,
            format!("{} build log line(s) could not be written", failures),
        )
    }
}

/// Categories of warnings that can occur during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Certificate issuance failed or timed out.
    CertificateIssuance,
    /// A container, workspace or compose file could not be cleaned up or written.
    Cleanup,
    /// The log sink rejected lines.
    LogWrite,
}
