// ABOUTME: Turns a built workspace into something the engine can run.
// ABOUTME: Generated Dockerfile for node, nginx plus uploaded files for static, pulled image for service.

use super::PipelineError;
use crate::deploy::ContainerUpload;
use crate::model::{
    BuildPack, DeploymentTarget, NODE_BASE_IMAGE, STATIC_SERVER_IMAGE, STATIC_WEB_ROOT,
};
use crate::runtime::BuildContext;
use crate::types::BuildId;
use std::io;
use std::path::Path;

/// Name of the generated Dockerfile inside the build context.
pub const GENERATED_DOCKERFILE: &str = ".deckhand.Dockerfile";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Pulled from a registry before the container is created.
    Pull,
    /// Built on the engine from the workspace.
    Built,
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub image: String,
    pub source: ImageSource,
    pub command: Option<Vec<String>>,
    pub upload: Option<ContainerUpload>,
}

/// An artifact plus the image build it still needs, if any.
#[derive(Debug)]
pub struct PreparedArtifact {
    pub artifact: Artifact,
    pub build: Option<BuildContext>,
}

fn shell_command(cmd: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), cmd.to_string()]
}

/// Dockerfile for a node workspace whose install and build already ran.
pub fn node_dockerfile(port: Option<u16>, start: Option<&str>) -> String {
    let mut dockerfile = format!("FROM {}\nWORKDIR /app\nCOPY . .\n", NODE_BASE_IMAGE);
    if let Some(port) = port {
        dockerfile.push_str(&format!("EXPOSE {}\n", port));
    }
    if let Some(start) = start {
        let cmd = serde_json::to_string(&shell_command(start)).unwrap_or_default();
        dockerfile.push_str(&format!("CMD {}\n", cmd));
    }
    dockerfile
}

/// Tar the contents of `dir`, plus extra in-memory files at the archive root.
pub fn tar_directory(dir: &Path, extra: &[(&str, &[u8])]) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);
    builder.append_dir_all(".", dir)?;
    for (name, data) in extra {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data)?;
    }
    builder.into_inner()
}

fn workdir_of<'a>(target: &DeploymentTarget, workdir: Option<&'a Path>) -> Result<&'a Path, PipelineError> {
    workdir.ok_or_else(|| {
        PipelineError::InputRejected(format!("target {} has no checked out source", target.id))
    })
}

/// Decide the artifact of a build. Blocking: archives the workspace.
pub fn prepare(
    target: &DeploymentTarget,
    build: &BuildId,
    workdir: Option<&Path>,
) -> Result<PreparedArtifact, PipelineError> {
    match target.build_pack {
        BuildPack::Node => {
            let workdir = workdir_of(target, workdir)?;
            let dockerfile = node_dockerfile(target.effective_port(), target.start_command());
            let archive = tar_directory(
                workdir,
                &[(GENERATED_DOCKERFILE, dockerfile.as_bytes())],
            )
            .map_err(|e| PipelineError::Workspace(format!("failed to archive workspace: {}", e)))?;
            let tag = format!("{}:{}", target.id, build);
            Ok(PreparedArtifact {
                artifact: Artifact {
                    image: tag.clone(),
                    source: ImageSource::Built,
                    command: None,
                    upload: None,
                },
                build: Some(BuildContext {
                    tag,
                    dockerfile: GENERATED_DOCKERFILE.to_string(),
                    archive,
                }),
            })
        }
        BuildPack::Static => {
            let workdir = workdir_of(target, workdir)?;
            let publish = target.publish_directory().unwrap_or(".");
            let dir = workdir.join(publish);
            if !dir.is_dir() {
                return Err(PipelineError::InputRejected(format!(
                    "publish directory '{}' does not exist after build",
                    publish
                )));
            }
            let archive = tar_directory(&dir, &[]).map_err(|e| {
                PipelineError::Workspace(format!("failed to archive publish directory: {}", e))
            })?;
            Ok(PreparedArtifact {
                artifact: Artifact {
                    image: STATIC_SERVER_IMAGE.to_string(),
                    source: ImageSource::Pull,
                    command: None,
                    upload: Some(ContainerUpload {
                        path: STATIC_WEB_ROOT.to_string(),
                        archive,
                    }),
                },
                build: None,
            })
        }
        BuildPack::Service => {
            let image = target.image.clone().ok_or_else(|| {
                PipelineError::InputRejected(format!("target {} has no image", target.id))
            })?;
            Ok(PreparedArtifact {
                artifact: Artifact {
                    image,
                    source: ImageSource::Pull,
                    command: target.start_command().map(shell_command),
                    upload: None,
                },
                build: None,
            })
        }
    }
}
