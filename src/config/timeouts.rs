// ABOUTME: Per-stage timeouts for the build pipeline.
// ABOUTME: Every external call of a stage runs under its stage's bound.

use crate::model::Stage;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StageTimeouts {
    #[serde(default = "default_fetch", with = "humantime_serde")]
    pub fetch: Duration,

    #[serde(default = "default_install", with = "humantime_serde")]
    pub install: Duration,

    #[serde(default = "default_build", with = "humantime_serde")]
    pub build: Duration,

    #[serde(default = "default_deploy", with = "humantime_serde")]
    pub deploy: Duration,

    #[serde(default = "default_route", with = "humantime_serde")]
    pub route: Duration,

    #[serde(default = "default_secure", with = "humantime_serde")]
    pub secure: Duration,

    /// Grace period when stopping a container.
    #[serde(default = "default_stop", with = "humantime_serde")]
    pub stop: Duration,
}

fn default_fetch() -> Duration {
    Duration::from_secs(300)
}

fn default_install() -> Duration {
    Duration::from_secs(900)
}

fn default_build() -> Duration {
    Duration::from_secs(1800)
}

fn default_deploy() -> Duration {
    Duration::from_secs(300)
}

fn default_route() -> Duration {
    Duration::from_secs(60)
}

fn default_secure() -> Duration {
    Duration::from_secs(300)
}

fn default_stop() -> Duration {
    Duration::from_secs(10)
}

impl Default for StageTimeouts {
    fn default() -> Self {
        StageTimeouts {
            fetch: default_fetch(),
            install: default_install(),
            build: default_build(),
            deploy: default_deploy(),
            route: default_route(),
            secure: default_secure(),
            stop: default_stop(),
        }
    }
}

impl StageTimeouts {
    pub fn for_stage(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Fetching => self.fetch,
            Stage::Installing => self.install,
            Stage::Building => self.build,
            Stage::Deploying => self.deploy,
            Stage::Routing => self.route,
            Stage::Securing => self.secure,
        }
    }
}
