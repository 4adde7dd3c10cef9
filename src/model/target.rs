// ABOUTME: Deployment target: what to build, where to run it, and how it is reached.
// ABOUTME: Resolves effective commands and preview-aware names for a build.

use super::{BuildPack, ConfigFingerprint, EngineBinding, SourceBinding};
use crate::types::{BuildId, Domain, PreviewId, TargetId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentTarget {
    pub id: TargetId,
    pub source: Option<SourceBinding>,
    pub engine: EngineBinding,
    pub build_pack: BuildPack,
    pub port: Option<u16>,
    pub install_command: Option<String>,
    pub build_command: Option<String>,
    pub start_command: Option<String>,
    pub base_directory: Option<String>,
    pub publish_directory: Option<String>,
    /// Image reference for `service` targets.
    pub image: Option<String>,
    pub domain: Option<Domain>,
    /// Preview domain template; `{id}` is replaced by the preview id.
    pub preview_domain: Option<String>,
    pub force_ssl: bool,
    pub config_hash: Option<ConfigFingerprint>,
    pub env: BTreeMap<String, String>,
}

/// An explicit empty command disables the build pack default.
fn effective<'a>(explicit: &'a Option<String>, default: Option<&'static str>) -> Option<&'a str> {
    match explicit {
        Some(cmd) if cmd.trim().is_empty() => None,
        Some(cmd) => Some(cmd.as_str()),
        None => default,
    }
}

impl DeploymentTarget {
    pub fn new(id: TargetId, engine: EngineBinding, build_pack: BuildPack) -> Self {
        Self {
            id,
            source: None,
            engine,
            build_pack,
            port: None,
            install_command: None,
            build_command: None,
            start_command: None,
            base_directory: None,
            publish_directory: None,
            image: None,
            domain: None,
            preview_domain: None,
            force_ssl: false,
            config_hash: None,
            env: BTreeMap::new(),
        }
    }

    pub fn install_command(&self) -> Option<&str> {
        effective(&self.install_command, self.build_pack.defaults().install_command)
    }

    pub fn build_command(&self) -> Option<&str> {
        effective(&self.build_command, self.build_pack.defaults().build_command)
    }

    pub fn start_command(&self) -> Option<&str> {
        effective(&self.start_command, self.build_pack.defaults().start_command)
    }

    pub fn effective_port(&self) -> Option<u16> {
        self.port.or(self.build_pack.defaults().port)
    }

    pub fn publish_directory(&self) -> Option<&str> {
        self.publish_directory
            .as_deref()
            .or(self.build_pack.defaults().publish_directory)
    }

    /// Fingerprint of the current build-affecting fields.
    pub fn compute_fingerprint(&self) -> ConfigFingerprint {
        ConfigFingerprint::compute(
            self.build_pack,
            self.port,
            self.install_command.as_deref(),
            self.build_command.as_deref(),
            self.start_command.as_deref(),
        )
    }

    /// Stored fingerprint, computed and stored first if absent.
    pub fn ensure_fingerprint(&mut self) -> &ConfigFingerprint {
        let fingerprint = match self.config_hash.take() {
            Some(stored) => stored,
            None => self.compute_fingerprint(),
        };
        self.config_hash.insert(fingerprint)
    }

    /// True when the stored fingerprint no longer matches the fields.
    pub fn has_config_drift(&self) -> bool {
        self.config_hash
            .as_ref()
            .is_some_and(|stored| *stored != self.compute_fingerprint())
    }

    /// `<target>` or `<target>-<preview>`: backend and label namespace.
    pub fn deployment_name(&self, preview: Option<PreviewId>) -> String {
        match preview {
            Some(id) => format!("{}-{}", self.id, id),
            None => self.id.to_string(),
        }
    }

    /// Container name for one build of the deployment.
    pub fn container_name(&self, preview: Option<PreviewId>, build: &BuildId) -> String {
        format!("{}-{}", self.deployment_name(preview), build.short())
    }

    /// Public domain of the deployment, if routed.
    pub fn domain_for(&self, preview: Option<PreviewId>) -> Option<Domain> {
        let domain = self.domain.as_ref()?;
        let Some(id) = preview else {
            return Some(domain.clone());
        };
        if let Some(template) = &self.preview_domain {
            let rendered = template.replace("{id}", &id.to_string());
            let with_scheme = if rendered.contains("://") {
                rendered
            } else {
                let scheme = if domain.is_https() { "https" } else { "http" };
                format!("{}://{}", scheme, rendered)
            };
            if let Ok(parsed) = Domain::parse(&with_scheme) {
                return Some(parsed);
            }
            tracing::warn!(template = %template, "Invalid preview domain template, using default");
        }
        Some(domain.for_preview(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(pack: BuildPack) -> DeploymentTarget {
        DeploymentTarget::new(
            TargetId::new("site").unwrap(),
            EngineBinding::local("deckhand"),
            pack,
        )
    }

    #[test]
    fn explicit_commands_override_defaults() {
        let mut t = target(BuildPack::Node);
        assert_eq!(t.install_command(), Some("npm install"));
        t.install_command = Some("yarn".into());
        assert_eq!(t.install_command(), Some("yarn"));
        t.build_command = Some("  ".into());
        assert_eq!(t.build_command(), None);
    }

    #[test]
    fn fingerprint_is_computed_only_when_absent() {
        let mut t = target(BuildPack::Static);
        let first = t.ensure_fingerprint().clone();
        t.port = Some(8080);
        assert_eq!(t.ensure_fingerprint(), &first);
        assert!(t.has_config_drift());
    }

    #[test]
    fn names_are_preview_aware() {
        let t = target(BuildPack::Static);
        let build = BuildId::new("0123456789abcdef".into());
        assert_eq!(t.deployment_name(None), "site");
        assert_eq!(t.container_name(None, &build), "site-01234567");
        assert_eq!(
            t.container_name(Some(PreviewId::new(42)), &build),
            "site-42-01234567"
        );
    }

    #[test]
    fn preview_domain_uses_template_when_set() {
        let mut t = target(BuildPack::Static);
        t.domain = Some(Domain::parse("https://site.example.com").unwrap());
        let pr = Some(PreviewId::new(7));
        assert_eq!(t.domain_for(pr).unwrap().host(), "7.site.example.com");

        t.preview_domain = Some("pr-{id}.preview.example.com".into());
        let d = t.domain_for(pr).unwrap();
        assert_eq!(d.host(), "pr-7.preview.example.com");
        assert!(d.is_https());
    }
}
