// ABOUTME: Durable record of one build of a deployment target.
// ABOUTME: Status, current stage and reason code, immutable once terminal.

use super::ConfigFingerprint;
use crate::types::{BuildId, PreviewId, TargetId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildStatus::Succeeded | BuildStatus::Failed)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Queued => "queued",
            BuildStatus::Running => "running",
            BuildStatus::Succeeded => "succeeded",
            BuildStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetching,
    Installing,
    Building,
    Deploying,
    Routing,
    Securing,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Fetching,
        Stage::Installing,
        Stage::Building,
        Stage::Deploying,
        Stage::Routing,
        Stage::Securing,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Fetching => "fetching",
            Stage::Installing => "installing",
            Stage::Building => "building",
            Stage::Deploying => "deploying",
            Stage::Routing => "routing",
            Stage::Securing => "securing",
        };
        f.write_str(s)
    }
}

/// Why a build failed. The log holds the detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    InputRejected,
    CommandFailed,
    EngineUnreachable,
    EngineFailed,
    ReadinessTimeout,
    ProxyTransactionFailed,
    StageTimeout,
    Cancelled,
    WorkspaceFailed,
    Interrupted,
    UnknownTarget,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::InputRejected => "input_rejected",
            ReasonCode::CommandFailed => "command_failed",
            ReasonCode::EngineUnreachable => "engine_unreachable",
            ReasonCode::EngineFailed => "engine_failed",
            ReasonCode::ReadinessTimeout => "readiness_timeout",
            ReasonCode::ProxyTransactionFailed => "proxy_transaction_failed",
            ReasonCode::StageTimeout => "stage_timeout",
            ReasonCode::Cancelled => "cancelled",
            ReasonCode::WorkspaceFailed => "workspace_failed",
            ReasonCode::Interrupted => "interrupted",
            ReasonCode::UnknownTarget => "unknown_target",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildRun {
    pub id: BuildId,
    pub target: TargetId,
    pub preview: Option<PreviewId>,
    pub status: BuildStatus,
    pub stage: Option<Stage>,
    pub reason: Option<ReasonCode>,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub host: Option<String>,
    pub pid: Option<u32>,
    /// Target fingerprint at admission time.
    #[serde(default)]
    pub config_hash: Option<ConfigFingerprint>,
}

impl BuildRun {
    pub fn queued(id: BuildId, target: TargetId, preview: Option<PreviewId>) -> Self {
        Self {
            id,
            target,
            preview,
            status: BuildStatus::Queued,
            stage: None,
            reason: None,
            queued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            host: None,
            pid: None,
            config_hash: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether this run occupies the admission slot of `target`. Previews
    /// share their target's slot.
    pub fn blocks(&self, target: &TargetId) -> bool {
        !self.is_terminal() && &self.target == target
    }

    /// Returns false if the run was not queued.
    pub fn start(&mut self, host: String, pid: u32) -> bool {
        if self.status != BuildStatus::Queued {
            return false;
        }
        self.status = BuildStatus::Running;
        self.started_at = Some(Utc::now());
        self.host = Some(host);
        self.pid = Some(pid);
        true
    }

    pub fn enter_stage(&mut self, stage: Stage) -> bool {
        if self.status != BuildStatus::Running {
            return false;
        }
        self.stage = Some(stage);
        true
    }

    pub fn succeed(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = BuildStatus::Succeeded;
        self.finished_at = Some(Utc::now());
        true
    }

    pub fn fail(&mut self, reason: ReasonCode) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = BuildStatus::Failed;
        self.reason = Some(reason);
        self.finished_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> BuildRun {
        BuildRun::queued(
            BuildId::new("b1".into()),
            TargetId::new("site").unwrap(),
            None,
        )
    }

    #[test]
    fn lifecycle_moves_forward() {
        let mut r = run();
        assert!(r.start("host".into(), 42));
        assert!(r.enter_stage(Stage::Fetching));
        assert!(r.succeed());
        assert_eq!(r.status, BuildStatus::Succeeded);
        assert!(r.finished_at.is_some());
    }

    #[test]
    fn terminal_records_are_immutable() {
        let mut r = run();
        assert!(r.fail(ReasonCode::Cancelled));
        assert!(!r.succeed());
        assert!(!r.fail(ReasonCode::Interrupted));
        assert!(!r.start("host".into(), 1));
        assert_eq!(r.reason, Some(ReasonCode::Cancelled));
    }

    #[test]
    fn stage_requires_running() {
        let mut r = run();
        assert!(!r.enter_stage(Stage::Building));
        assert_eq!(r.stage, None);
    }

    #[test]
    fn preview_builds_share_the_target_slot() {
        let target = TargetId::new("site").unwrap();
        let mut preview = BuildRun::queued(
            BuildId::new("b2".into()),
            target.clone(),
            Some(PreviewId::new(42)),
        );
        assert!(run().blocks(&target));
        assert!(preview.blocks(&target));
        assert!(!preview.blocks(&TargetId::new("blog").unwrap()));

        assert!(preview.fail(ReasonCode::Cancelled));
        assert!(!preview.blocks(&target));
    }

    #[test]
    fn reason_codes_serialize_snake_case() {
        let json = serde_json::to_string(&ReasonCode::ProxyTransactionFailed).unwrap();
        assert_eq!(json, "\"proxy_transaction_failed\"");
        assert_eq!(ReasonCode::ProxyTransactionFailed.to_string(), "proxy_transaction_failed");
    }
}
