// ABOUTME: Certificate issuer running `certbot certonly --standalone` in a container.
// ABOUTME: One attempt per call: pull, run to exit, remove.

use super::{Certificate, CertificateIssuer, IssueError};
use crate::config::AcmeConfig;
use crate::deploy::labels;
use crate::model::EngineBinding;
use crate::runtime::{
    ContainerConfig, ContainerEngine, ContainerError, ContainerOps, EngineConnector, ImageOps,
    MountKind, VolumeMount,
};
use crate::types::{ContainerId, Domain, TargetId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Alias the proxy forwards ACME HTTP challenges to.
pub const CERTBOT_ALIAS: &str = "deckhand-certbot";

const LETSENCRYPT_DIR: &str = "/etc/letsencrypt";

pub struct CertbotIssuer {
    connector: Arc<dyn EngineConnector>,
    binding: EngineBinding,
    config: AcmeConfig,
    stop_timeout: Duration,
}

impl CertbotIssuer {
    pub fn new(
        connector: Arc<dyn EngineConnector>,
        binding: EngineBinding,
        config: AcmeConfig,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            binding,
            config,
            stop_timeout,
        }
    }

    fn command(&self, host: &str) -> Vec<String> {
        let mut cmd: Vec<String> = [
            "certonly",
            "--standalone",
            "--preferred-challenges",
            "http",
            "-d",
            host,
            "--agree-tos",
            "--non-interactive",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        match &self.config.email {
            Some(email) => {
                cmd.push("--email".to_string());
                cmd.push(email.clone());
            }
            None => cmd.push("--register-unsafely-without-email".to_string()),
        }
        if self.config.staging {
            cmd.push("--staging".to_string());
        }
        cmd
    }

    fn container_config(&self, name: &str, host: &str, target: &TargetId) -> ContainerConfig {
        let mut container_labels = HashMap::new();
        container_labels.insert(labels::MANAGED.to_string(), "true".to_string());
        container_labels.insert(labels::TARGET.to_string(), target.to_string());
        container_labels.insert(labels::ROLE.to_string(), labels::ROLE_CERTBOT.to_string());

        ContainerConfig {
            name: name.to_string(),
            image: self.config.image.clone(),
            labels: container_labels,
            volumes: vec![VolumeMount {
                source: self.config.volume.clone(),
                target: LETSENCRYPT_DIR.to_string(),
                kind: MountKind::Volume,
                read_only: false,
            }],
            command: Some(self.command(host)),
            network: Some(self.binding.network.clone()),
            network_aliases: vec![CERTBOT_ALIAS.to_string()],
            ..Default::default()
        }
    }

    async fn run(
        &self,
        engine: &dyn ContainerEngine,
        id: &ContainerId,
        config: &ContainerConfig,
    ) -> Result<i64, IssueError> {
        engine.create_container(config).await.map_err(engine_error)?;
        engine.start_container(id).await.map_err(engine_error)?;
        engine.wait_container(id).await.map_err(engine_error)
    }
}

fn engine_error(err: ContainerError) -> IssueError {
    match err {
        ContainerError::Unreachable(msg) => IssueError::Unreachable(msg),
        other => IssueError::Engine(other.to_string()),
    }
}

#[async_trait]
impl CertificateIssuer for CertbotIssuer {
    async fn issue(&self, domain: &Domain, target: &TargetId) -> Result<Certificate, IssueError> {
        let host = domain.host();
        let engine = self
            .connector
            .connect(&self.binding)
            .await
            .map_err(|e| IssueError::Unreachable(e.to_string()))?;

        engine
            .pull_image(&self.config.image)
            .await
            .map_err(|e| IssueError::Engine(e.to_string()))?;

        let name = format!("certbot-{}", target);
        let id = ContainerId::new(name.clone());
        // Leftover from an earlier attempt would block the name.
        engine
            .teardown(&id, self.stop_timeout)
            .await
            .map_err(engine_error)?;

        let config = self.container_config(&name, host, target);
        tracing::info!(domain = host, container = %name, "Requesting certificate");
        let outcome = self.run(engine.as_ref(), &id, &config).await;

        if let Err(e) = engine.teardown(&id, self.stop_timeout).await {
            tracing::warn!(container = %name, error = %e, "Failed to remove certbot container");
        }

        match outcome? {
            0 => Ok(Certificate::issued_now(host)),
            exit_code => Err(IssueError::Rejected {
                domain: host.to_string(),
                exit_code,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{EngineConnector, RuntimeError};

    struct NoEngine;

    #[async_trait]
    impl EngineConnector for NoEngine {
        async fn connect(
            &self,
            _binding: &EngineBinding,
        ) -> Result<Arc<dyn ContainerEngine>, RuntimeError> {
            unreachable!("not connected in these tests")
        }
    }

    fn issuer(config: AcmeConfig) -> CertbotIssuer {
        CertbotIssuer::new(
            Arc::new(NoEngine),
            EngineBinding::local("deckhand"),
            config,
            Duration::from_secs(1),
        )
    }

    #[test]
    fn command_without_email_registers_unsafely() {
        let cmd = issuer(AcmeConfig::default()).command("app.example.com");
        assert_eq!(&cmd[..2], ["certonly", "--standalone"]);
        assert!(cmd.contains(&"app.example.com".to_string()));
        assert!(cmd.contains(&"--register-unsafely-without-email".to_string()));
        assert!(!cmd.contains(&"--staging".to_string()));
    }

    #[test]
    fn staging_and_email_are_passed_through() {
        let config = AcmeConfig {
            email: Some("ops@example.com".into()),
            staging: true,
            ..Default::default()
        };
        let cmd = issuer(config).command("app.example.com");
        assert!(cmd.windows(2).any(|w| w == ["--email", "ops@example.com"]));
        assert!(cmd.contains(&"--staging".to_string()));
    }

    #[test]
    fn container_mounts_letsencrypt_volume_on_engine_network() {
        let target = TargetId::new("site").unwrap();
        let cfg = issuer(AcmeConfig::default()).container_config(
            "certbot-site",
            "app.example.com",
            &target,
        );
        assert_eq!(cfg.volumes[0].source, "deckhand-letsencrypt");
        assert_eq!(cfg.volumes[0].target, "/etc/letsencrypt");
        assert_eq!(cfg.network.as_deref(), Some("deckhand"));
        assert_eq!(cfg.network_aliases, vec![CERTBOT_ALIAS.to_string()]);
    }
}
