// ABOUTME: In-memory container engine for pipeline and teardown tests.
// ABOUTME: Tracks containers, networks, pulls and builds; failures can be injected.

use async_trait::async_trait;
use deckhand::runtime::{
    BuildContext, ContainerConfig, ContainerEngine, ContainerError, ContainerFilters, ContainerInfo,
    ContainerOps, ContainerState, ContainerSummary, EngineConnector, ExecConfig, ExecError,
    ExecOps, ExecResult, ImageError, ImageOps, NetworkConfig, NetworkError, NetworkOps,
    RuntimeError,
};
use deckhand::model::EngineBinding;
use deckhand::types::{ContainerId, NetworkId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub labels: HashMap<String, String>,
    pub network: Option<String>,
    pub state: ContainerState,
    pub uploads: Vec<String>,
}

impl FakeContainer {
    fn state_name(&self) -> &'static str {
        match self.state {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
        }
    }

    fn summary(&self) -> ContainerSummary {
        ContainerSummary {
            id: ContainerId::new(self.id.clone()),
            name: self.name.clone(),
            image: self.image.clone(),
            state: self.state_name().to_string(),
            labels: self.labels.clone(),
        }
    }
}

#[derive(Default)]
struct EngineState {
    containers: BTreeMap<String, FakeContainer>,
    networks: BTreeSet<String>,
    next_id: u64,
    pulled: Vec<String>,
    built: Vec<String>,
    missing_images: HashSet<String>,
    undeletable: HashSet<String>,
    stalled: HashSet<String>,
    probe_exit_code: i64,
    unreachable: bool,
}

impl EngineState {
    /// Containers are addressed by id or name, like the real engine.
    fn key_of(&self, id: &ContainerId) -> Option<String> {
        if self.containers.contains_key(id.as_str()) {
            return Some(id.to_string());
        }
        self.containers
            .values()
            .find(|c| c.name == id.as_str())
            .map(|c| c.id.clone())
    }
}

#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Exit code of every readiness exec from now on.
    pub fn set_probe_exit_code(&self, code: i64) {
        self.state.lock().probe_exit_code = code;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    pub fn fail_pull(&self, image: &str) {
        self.state.lock().missing_images.insert(image.to_string());
    }

    /// Make removal of the named container fail.
    pub fn refuse_removal(&self, name: &str) {
        self.state.lock().undeletable.insert(name.to_string());
    }

    /// Make removal of the named container never finish.
    pub fn stall_removal(&self, name: &str) {
        self.state.lock().stalled.insert(name.to_string());
    }

    /// Place a running container on the engine, as if left by another run.
    pub fn seed(&self, name: &str, network: &str, labels: &[(&str, &str)]) -> String {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = format!("seed{:04}", state.next_id);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                id: id.clone(),
                name: name.to_string(),
                image: "seeded:latest".to_string(),
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                network: Some(network.to_string()),
                state: ContainerState::Running,
                uploads: Vec::new(),
            },
        );
        id
    }

    pub fn containers(&self) -> Vec<FakeContainer> {
        self.state.lock().containers.values().cloned().collect()
    }

    pub fn running_names(&self) -> Vec<String> {
        self.state
            .lock()
            .containers
            .values()
            .filter(|c| c.state == ContainerState::Running)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn container(&self, name: &str) -> Option<FakeContainer> {
        self.state
            .lock()
            .containers
            .values()
            .find(|c| c.name == name)
            .cloned()
    }

    pub fn pulled(&self) -> Vec<String> {
        self.state.lock().pulled.clone()
    }

    pub fn built(&self) -> Vec<String> {
        self.state.lock().built.clone()
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.state.lock().networks.contains(name)
    }

    fn check_reachable<E>(&self, wrap: fn(String) -> E) -> Result<(), E> {
        if self.state.lock().unreachable {
            return Err(wrap("connection refused".to_string()));
        }
        Ok(())
    }
}

fn matches(container: &FakeContainer, filters: &ContainerFilters) -> bool {
    let labels = filters
        .labels
        .iter()
        .all(|(k, v)| container.labels.get(k) == Some(v));
    let keys = filters
        .label_keys
        .iter()
        .all(|k| container.labels.contains_key(k));
    let name = filters
        .name
        .as_ref()
        .is_none_or(|n| container.name.contains(n.as_str()));
    let network = filters
        .network
        .as_ref()
        .is_none_or(|n| container.network.as_ref() == Some(n));
    let running = filters.all || container.state == ContainerState::Running;
    labels && keys && name && network && running
}

#[async_trait]
impl ContainerOps for FakeEngine {
    async fn create_container(&self, config: &ContainerConfig) -> Result<ContainerId, ContainerError> {
        self.check_reachable(ContainerError::Unreachable)?;
        let mut state = self.state.lock();
        if state.containers.values().any(|c| c.name == config.name) {
            return Err(ContainerError::AlreadyExists(config.name.clone()));
        }
        state.next_id += 1;
        let id = format!("c{:06}", state.next_id);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                id: id.clone(),
                name: config.name.clone(),
                image: config.image.clone(),
                labels: config.labels.clone(),
                network: config.network.clone(),
                state: ContainerState::Created,
                uploads: Vec::new(),
            },
        );
        Ok(ContainerId::new(id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.check_reachable(ContainerError::Unreachable)?;
        let mut state = self.state.lock();
        let key = state
            .key_of(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        let container = state
            .containers
            .get_mut(&key)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if container.state == ContainerState::Running {
            return Err(ContainerError::AlreadyRunning(id.to_string()));
        }
        container.state = ContainerState::Running;
        Ok(())
    }

    async fn stop_container(&self, id: &ContainerId, _timeout: Duration) -> Result<(), ContainerError> {
        self.check_reachable(ContainerError::Unreachable)?;
        let mut state = self.state.lock();
        let key = state
            .key_of(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        let container = state
            .containers
            .get_mut(&key)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if container.state != ContainerState::Running {
            return Err(ContainerError::NotRunning(id.to_string()));
        }
        container.state = ContainerState::Exited;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, _force: bool) -> Result<(), ContainerError> {
        self.check_reachable(ContainerError::Unreachable)?;
        let stalled = {
            let state = self.state.lock();
            state
                .key_of(id)
                .is_some_and(|key| state.stalled.contains(&state.containers[&key].name))
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock();
        let key = state
            .key_of(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        let name = state.containers[&key].name.clone();
        if state.undeletable.contains(&name) {
            return Err(ContainerError::Runtime(format!("device busy: {}", name)));
        }
        state.containers.remove(&key);
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        self.check_reachable(ContainerError::Unreachable)?;
        let state = self.state.lock();
        let key = state
            .key_of(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        let c = &state.containers[&key];
        Ok(ContainerInfo {
            id: ContainerId::new(c.id.clone()),
            name: c.name.clone(),
            image: c.image.clone(),
            state: c.state,
            labels: c.labels.clone(),
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        self.check_reachable(ContainerError::Unreachable)?;
        Ok(self
            .state
            .lock()
            .containers
            .values()
            .filter(|c| matches(c, filters))
            .map(FakeContainer::summary)
            .collect())
    }

    async fn upload_archive(
        &self,
        id: &ContainerId,
        path: &str,
        _archive: Vec<u8>,
    ) -> Result<(), ContainerError> {
        self.check_reachable(ContainerError::Unreachable)?;
        let mut state = self.state.lock();
        let key = state
            .key_of(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if let Some(container) = state.containers.get_mut(&key) {
            container.uploads.push(path.to_string());
        }
        Ok(())
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        self.check_reachable(ContainerError::Unreachable)?;
        let mut state = self.state.lock();
        let key = state
            .key_of(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if let Some(container) = state.containers.get_mut(&key) {
            container.state = ContainerState::Exited;
        }
        Ok(0)
    }
}

#[async_trait]
impl ImageOps for FakeEngine {
    async fn pull_image(&self, reference: &str) -> Result<(), ImageError> {
        self.check_reachable(ImageError::Unreachable)?;
        let mut state = self.state.lock();
        if state.missing_images.contains(reference) {
            return Err(ImageError::PullFailed(format!("manifest unknown: {}", reference)));
        }
        state.pulled.push(reference.to_string());
        Ok(())
    }

    async fn build_image(&self, context: &BuildContext) -> Result<Vec<String>, ImageError> {
        self.check_reachable(ImageError::Unreachable)?;
        self.state.lock().built.push(context.tag.clone());
        Ok(vec![format!("Successfully tagged {}", context.tag)])
    }
}

#[async_trait]
impl NetworkOps for FakeEngine {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        self.check_reachable(NetworkError::Unreachable)?;
        if !self.state.lock().networks.insert(config.name.clone()) {
            return Err(NetworkError::AlreadyExists(config.name.clone()));
        }
        Ok(NetworkId::new(format!("net-{}", config.name)))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        self.check_reachable(NetworkError::Unreachable)?;
        Ok(self.state.lock().networks.contains(name))
    }
}

#[async_trait]
impl ExecOps for FakeEngine {
    async fn exec(&self, container: &ContainerId, _config: &ExecConfig) -> Result<ExecResult, ExecError> {
        self.check_reachable(ExecError::Unreachable)?;
        let state = self.state.lock();
        let key = state
            .key_of(container)
            .ok_or_else(|| ExecError::ContainerNotFound(container.to_string()))?;
        if state.containers[&key].state != ContainerState::Running {
            return Err(ExecError::ContainerNotRunning(container.to_string()));
        }
        Ok(ExecResult {
            exit_code: state.probe_exit_code,
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }
}

/// Hands out the same fake engine for every binding.
pub struct FakeConnector {
    engine: Arc<FakeEngine>,
}

impl FakeConnector {
    pub fn new(engine: Arc<FakeEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EngineConnector for FakeConnector {
    async fn connect(&self, _binding: &EngineBinding) -> Result<Arc<dyn ContainerEngine>, RuntimeError> {
        let engine: Arc<dyn ContainerEngine> = self.engine.clone();
        Ok(engine)
    }
}
