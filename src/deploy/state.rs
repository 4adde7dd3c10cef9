// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: States after container start carry the new container's id.

use crate::types::ContainerId;

/// Planned, nothing created yet.
/// Available actions: `discover_previous()`, `ensure_network()`, `start_container()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialized;

/// New container created and started; previous containers still serve.
/// Available actions: `wait_ready()`, `rollback()`
#[derive(Debug, Clone)]
pub struct ContainerStarted {
    pub(crate) container: ContainerId,
}

/// Readiness probe passed.
/// Available actions: `route()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Ready {
    pub(crate) container: ContainerId,
}

/// Proxy transaction committed; traffic reaches the new container.
/// Available actions: `retire_previous()`
#[derive(Debug, Clone)]
pub struct Routed {
    pub(crate) container: ContainerId,
}

/// Previous containers retired.
#[derive(Debug, Clone)]
pub struct Completed {
    pub(crate) container: ContainerId,
    pub(crate) retired: Vec<String>,
    pub(crate) leftover: Vec<String>,
}

pub(crate) trait HasContainer {
    fn container_id(&self) -> &ContainerId;
}

macro_rules! has_container {
    ($($state:ty),*) => {
        $(impl HasContainer for $state {
            fn container_id(&self) -> &ContainerId {
                &self.container
            }
        })*
    };
}

has_container!(ContainerStarted, Ready, Routed, Completed);
