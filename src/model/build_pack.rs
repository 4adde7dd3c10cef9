// ABOUTME: Build packs select default commands, ports and artifact kind.
// ABOUTME: node builds an image, static serves files via nginx, service runs a prebuilt image.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Image that serves the publish directory of `static` targets.
pub const STATIC_SERVER_IMAGE: &str = "nginx:stable-alpine";

/// Web root of [`STATIC_SERVER_IMAGE`].
pub const STATIC_WEB_ROOT: &str = "/usr/share/nginx/html";

/// Base image for generated `node` Dockerfiles.
pub const NODE_BASE_IMAGE: &str = "node:lts-alpine";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPack {
    Node,
    Static,
    Service,
}

/// Defaults a build pack supplies when the target leaves a field unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildPackDefaults {
    pub install_command: Option<&'static str>,
    pub build_command: Option<&'static str>,
    pub start_command: Option<&'static str>,
    pub port: Option<u16>,
    pub publish_directory: Option<&'static str>,
}

impl BuildPack {
    pub fn name(self) -> &'static str {
        match self {
            BuildPack::Node => "node",
            BuildPack::Static => "static",
            BuildPack::Service => "service",
        }
    }

    pub fn defaults(self) -> BuildPackDefaults {
        match self {
            BuildPack::Node => BuildPackDefaults {
                install_command: Some("npm install"),
                build_command: Some("npm run build"),
                start_command: Some("npm run start"),
                port: Some(3000),
                publish_directory: None,
            },
            BuildPack::Static => BuildPackDefaults {
                install_command: Some("npm install"),
                build_command: Some("npm run build"),
                start_command: None,
                port: Some(80),
                publish_directory: Some("dist"),
            },
            BuildPack::Service => BuildPackDefaults {
                install_command: None,
                build_command: None,
                start_command: None,
                port: None,
                publish_directory: None,
            },
        }
    }

    /// Whether the pipeline checks out source code for this pack.
    pub fn needs_source(self) -> bool {
        !matches!(self, BuildPack::Service)
    }
}

impl fmt::Display for BuildPack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
