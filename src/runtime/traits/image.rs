// ABOUTME: Image operations trait for container engines.
// ABOUTME: Pull registry images and build images from a tar context.

use super::shared_types::BuildContext;
use async_trait::async_trait;

/// Image operations: pull and build.
#[async_trait]
pub trait ImageOps: Send + Sync {
    /// Pull an image from a registry.
    async fn pull_image(&self, reference: &str) -> Result<(), ImageError>;

    /// Build an image; returns the build output lines.
    async fn build_image(&self, context: &BuildContext) -> Result<Vec<String>, ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("engine unreachable: {0}")]
    Unreachable(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
