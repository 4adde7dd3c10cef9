// ABOUTME: Shared types used across engine trait definitions.
// ABOUTME: ContainerConfig, ContainerInfo, NetworkConfig, BuildContext, etc.

use crate::types::ContainerId;
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for creating a container.
#[derive(Debug, Clone, Default)]
pub struct ContainerConfig {
    /// Name for the container.
    pub name: String,
    /// Image to run.
    pub image: String,
    /// Environment variables.
    pub env: HashMap<String, String>,
    /// Labels to apply.
    pub labels: HashMap<String, String>,
    /// Volume mounts.
    pub volumes: Vec<VolumeMount>,
    /// Command to run (overrides image CMD).
    pub command: Option<Vec<String>>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// Restart policy.
    pub restart_policy: RestartPolicyConfig,
    /// Port the service listens on inside the container.
    pub exposed_port: Option<u16>,
    /// Stop timeout.
    pub stop_timeout: Option<Duration>,
    /// Network to connect to.
    pub network: Option<String>,
    /// Network aliases.
    pub network_aliases: Vec<String>,
}

/// Volume mount configuration.
#[derive(Debug, Clone)]
pub struct VolumeMount {
    /// Source path or volume name.
    pub source: String,
    /// Target path in container.
    pub target: String,
    pub kind: MountKind,
    /// Read-only flag.
    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    Bind,
    Volume,
}

/// Restart policy configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RestartPolicyConfig {
    /// Never restart.
    #[default]
    No,
    /// Always restart.
    Always,
    /// Restart unless explicitly stopped.
    UnlessStopped,
    /// Restart on failure with optional max retries.
    OnFailure { max_retries: Option<u32> },
}

impl From<&crate::config::RestartPolicy> for RestartPolicyConfig {
    fn from(policy: &crate::config::RestartPolicy) -> Self {
        use crate::config::RestartPolicy;
        match policy {
            RestartPolicy::No => RestartPolicyConfig::No,
            RestartPolicy::Always => RestartPolicyConfig::Always,
            RestartPolicy::UnlessStopped => RestartPolicyConfig::UnlessStopped,
            RestartPolicy::OnFailure { max_retries } => RestartPolicyConfig::OnFailure {
                max_retries: *max_retries,
            },
        }
    }
}

/// Information about a container.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub labels: HashMap<String, String>,
}

/// Container state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

/// Configuration for creating a network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name.
    pub name: String,
    /// Network driver (bridge, overlay, etc.).
    pub driver: Option<String>,
    /// Allow standalone containers on swarm overlay networks.
    pub attachable: bool,
    /// Labels.
    pub labels: HashMap<String, String>,
}

/// Input for an image build.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Tag of the resulting image.
    pub tag: String,
    /// Dockerfile path inside the context archive.
    pub dockerfile: String,
    /// Tar archive of the build context.
    pub archive: Vec<u8>,
}

/// Exec configuration for running commands in containers.
#[derive(Debug, Clone, Default)]
pub struct ExecConfig {
    /// Command and arguments to run.
    pub cmd: Vec<String>,
    /// Environment variables.
    pub env: Vec<String>,
    /// Working directory.
    pub working_dir: Option<String>,
}

impl ExecConfig {
    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            cmd: vec!["sh".to_string(), "-c".to_string(), command.into()],
            ..Default::default()
        }
    }
}

/// Result of an exec operation.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Exit code.
    pub exit_code: i64,
    /// Standard output.
    pub stdout: Vec<u8>,
    /// Standard error.
    pub stderr: Vec<u8>,
}
