// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: State types carry their own data for compile-time guarantees.

use super::plan::DeploymentPlan;
use super::state::{Completed, HasContainer, Initialized};
use crate::runtime::ContainerSummary;
use crate::types::ContainerId;

/// A deployment in progress, parameterized by its current state.
///
/// The previous containers of the same target and preview keep serving
/// until the new one is routed.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) plan: DeploymentPlan,
    pub(crate) previous: Vec<ContainerSummary>,
    pub(crate) state: S,
}

impl Deployment<Initialized> {
    pub fn new(plan: DeploymentPlan) -> Self {
        Deployment {
            plan,
            previous: Vec::new(),
            state: Initialized,
        }
    }
}

impl<S> Deployment<S> {
    pub fn plan(&self) -> &DeploymentPlan {
        &self.plan
    }

    /// Running containers this deployment replaces.
    pub fn previous(&self) -> &[ContainerSummary] {
        &self.previous
    }
}

#[allow(private_bounds)]
impl<S: HasContainer> Deployment<S> {
    pub fn new_container(&self) -> &ContainerId {
        self.state.container_id()
    }
}

impl Deployment<Completed> {
    /// Names of previous containers that were stopped and removed.
    pub fn retired(&self) -> &[String] {
        &self.state.retired
    }

    /// Previous containers that could not be removed.
    pub fn leftover(&self) -> &[String] {
        &self.state.leftover
    }

    pub fn finish(self) -> DeploymentPlan {
        self.plan
    }
}
