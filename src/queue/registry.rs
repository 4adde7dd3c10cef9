// ABOUTME: Known deployment targets, shared by admission and the workers.
// ABOUTME: Replaced wholesale when configuration is reloaded.

use crate::model::DeploymentTarget;
use crate::types::TargetId;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: RwLock<HashMap<TargetId, DeploymentTarget>>,
}

impl TargetRegistry {
    pub fn new(targets: impl IntoIterator<Item = DeploymentTarget>) -> Self {
        let registry = Self::default();
        registry.replace(targets);
        registry
    }

    /// Swap in a new set of targets. Fingerprints are computed for targets without one.
    pub fn replace(&self, targets: impl IntoIterator<Item = DeploymentTarget>) {
        let map = targets
            .into_iter()
            .map(|mut t| {
                t.ensure_fingerprint();
                (t.id.clone(), t)
            })
            .collect();
        *self.targets.write() = map;
    }

    pub fn get(&self, id: &TargetId) -> Option<DeploymentTarget> {
        self.targets.read().get(id).cloned()
    }

    pub fn contains(&self, id: &TargetId) -> bool {
        self.targets.read().contains_key(id)
    }

    pub fn ids(&self) -> Vec<TargetId> {
        let mut ids: Vec<TargetId> = self.targets.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
