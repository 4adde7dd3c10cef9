// ABOUTME: Turns an engine binding into a connected container engine.
// ABOUTME: Caches one bollard client per resolved endpoint.

use super::bollard::BollardEngine;
use super::error::RuntimeError;
use super::traits::ContainerEngine;
use crate::model::{EngineBinding, EngineEndpoint};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait EngineConnector: Send + Sync {
    /// Connect to the engine of a binding, verifying it answers.
    async fn connect(
        &self,
        binding: &EngineBinding,
    ) -> Result<Arc<dyn ContainerEngine>, RuntimeError>;
}

#[derive(Default)]
pub struct BollardEngineConnector {
    clients: Mutex<HashMap<EngineEndpoint, Arc<BollardEngine>>>,
}

impl BollardEngineConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, endpoint: &EngineEndpoint) -> Result<Arc<BollardEngine>, RuntimeError> {
        let mut clients = self.clients.lock();
        if let Some(existing) = clients.get(endpoint) {
            return Ok(existing.clone());
        }
        let engine = Arc::new(BollardEngine::connect(endpoint)?);
        clients.insert(endpoint.clone(), engine.clone());
        Ok(engine)
    }
}

#[async_trait]
impl EngineConnector for BollardEngineConnector {
    async fn connect(
        &self,
        binding: &EngineBinding,
    ) -> Result<Arc<dyn ContainerEngine>, RuntimeError> {
        let endpoint = binding.resolve_endpoint();
        let engine = self.client_for(&endpoint)?;
        if let Err(e) = engine.ping().await {
            self.clients.lock().remove(&endpoint);
            return Err(e);
        }
        tracing::debug!(engine = %binding.name, endpoint = %endpoint, "Connected to engine");
        Ok(engine as Arc<dyn ContainerEngine>)
    }
}
