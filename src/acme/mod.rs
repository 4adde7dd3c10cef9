// ABOUTME: TLS certificates for routed domains via a one-shot certbot container.
// ABOUTME: The ledger remembers when each domain was last issued.

mod certbot;
mod ledger;

pub use certbot::CertbotIssuer;
pub use ledger::CertificateLedger;

use crate::types::{Domain, TargetId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where certbot leaves live certificates inside its volume.
pub const LIVE_DIR: &str = "/etc/letsencrypt/live";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub domain: String,
    pub issued_at: DateTime<Utc>,
    pub path: String,
}

impl Certificate {
    pub fn issued_now(host: &str) -> Self {
        Self {
            domain: host.to_string(),
            issued_at: Utc::now(),
            path: format!("{}/{}/fullchain.pem", LIVE_DIR, host),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("engine unreachable: {0}")]
    Unreachable(String),

    #[error("certbot container failed: {0}")]
    Engine(String),

    #[error("certbot exited with code {exit_code} for {domain}")]
    Rejected { domain: String, exit_code: i64 },

    #[error("certificate ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("certificate ledger is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    async fn issue(&self, domain: &Domain, target: &TargetId) -> Result<Certificate, IssueError>;
}
