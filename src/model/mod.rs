// ABOUTME: Domain model: targets, bindings, build records and build packs.
// ABOUTME: Plain data shared by the queue, pipeline and CLI.

mod binding;
mod build;
mod build_pack;
mod fingerprint;
mod target;

pub use binding::{
    DEFAULT_API_URL, DEFAULT_HTML_URL, EngineBinding, EngineEndpoint, GithubApp, LOCAL_SOCKET,
    SourceBinding,
};
pub use build::{BuildRun, BuildStatus, ReasonCode, Stage};
pub use build_pack::{
    BuildPack, BuildPackDefaults, NODE_BASE_IMAGE, STATIC_SERVER_IMAGE, STATIC_WEB_ROOT,
};
pub use fingerprint::ConfigFingerprint;
pub use target::DeploymentTarget;
