// ABOUTME: Readiness probe configuration for new containers.
// ABOUTME: Bounded attempts at a fixed interval, each attempt bounded by a timeout.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReadinessConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// HTTP path to request instead of a plain TCP check.
    #[serde(default)]
    pub path: Option<String>,

    /// Replaces the generated in-container check entirely.
    #[serde(default)]
    pub command: Option<String>,
}

fn default_attempts() -> u32 {
    10
}

fn default_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        ReadinessConfig {
            attempts: default_attempts(),
            interval: default_interval(),
            timeout: default_timeout(),
            path: None,
            command: None,
        }
    }
}

impl ReadinessConfig {
    /// Shell command run inside the container; exit 0 means ready.
    pub fn probe_command(&self, port: Option<u16>) -> Option<String> {
        if let Some(cmd) = &self.command {
            return Some(cmd.clone());
        }
        let port = port?;
        Some(match &self.path {
            Some(path) => format!(
                "wget -q -O /dev/null http://127.0.0.1:{port}{path} || curl -fsS -o /dev/null http://127.0.0.1:{port}{path}"
            ),
            None => format!("nc -z 127.0.0.1 {port}"),
        })
    }
}
