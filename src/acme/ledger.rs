// ABOUTME: JSON file recording the issue time of each domain's certificate.
// ABOUTME: Decides whether a domain needs a fresh certificate.

use super::{Certificate, IssueError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub struct CertificateLedger {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Certificate>>,
}

impl CertificateLedger {
    /// Open the ledger at `path`; a missing file is an empty ledger.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, IssueError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn get(&self, host: &str) -> Option<Certificate> {
        self.entries.lock().get(host).cloned()
    }

    /// True when `host` has a certificate younger than `renew_after`.
    pub fn valid_for(&self, host: &str, now: DateTime<Utc>, renew_after: Duration) -> bool {
        let Some(cert) = self.get(host) else {
            return false;
        };
        let Ok(max_age) = chrono::Duration::from_std(renew_after) else {
            return true;
        };
        now - cert.issued_at < max_age
    }

    pub fn record(&self, certificate: &Certificate) -> Result<(), IssueError> {
        let mut entries = self.entries.lock();
        entries.insert(certificate.domain.clone(), certificate.clone());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&*entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
