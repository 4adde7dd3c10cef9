// ABOUTME: In-memory HAProxy Data Plane with real transaction semantics.
// ABOUTME: Each transaction stages a copy of the configuration that commit swaps in.

use async_trait::async_trait;
use deckhand::proxy::{
    Backend, BackendSwitchingRule, DataPlane, HostCondition, HttpRequestRule, ProxyError, Result,
    Server,
};
use deckhand::types::TransactionId;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Proxy configuration as the Data Plane API exposes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySnapshot {
    pub version: i64,
    pub backends: BTreeMap<String, Vec<Server>>,
    pub switching: Vec<BackendSwitchingRule>,
    pub requests: Vec<HttpRequestRule>,
}

impl ProxySnapshot {
    /// Backend that requests for `host` are switched to.
    pub fn route_for(&self, host: &str) -> Option<&str> {
        self.switching
            .iter()
            .find(|r| r.mentions_host(host))
            .map(|r| r.name.as_str())
    }

    /// Server addresses of `backend`.
    pub fn servers(&self, backend: &str) -> Vec<String> {
        self.backends
            .get(backend)
            .map(|servers| servers.iter().map(|s| s.address.clone()).collect())
            .unwrap_or_default()
    }

    pub fn forces_ssl(&self, host: &str) -> bool {
        self.requests.iter().any(|r| r.mentions_host(host))
    }
}

#[derive(Default)]
struct PlaneState {
    committed: ProxySnapshot,
    transactions: HashMap<String, ProxySnapshot>,
    next_tx: u64,
    failing_commits: usize,
    failing_begins: usize,
    stalled_commits: usize,
    stall: Duration,
    commits: usize,
}

#[derive(Default)]
pub struct FakeDataPlane {
    state: Mutex<PlaneState>,
}

trait Indexed {
    fn set_index(&mut self, index: i64);
}

impl Indexed for BackendSwitchingRule {
    fn set_index(&mut self, index: i64) {
        self.index = index;
    }
}

impl Indexed for HttpRequestRule {
    fn set_index(&mut self, index: i64) {
        self.index = index;
    }
}

fn reindex<R: Indexed>(rules: &mut [R]) {
    for (i, rule) in rules.iter_mut().enumerate() {
        rule.set_index(i as i64);
    }
}

fn insert_at<R: Indexed + Clone>(rules: &mut Vec<R>, index: i64, rule: &R) {
    let at = (index.max(0) as usize).min(rules.len());
    rules.insert(at, rule.clone());
    reindex(rules);
}

fn replace_at<R: Indexed + Clone>(rules: &mut [R], index: i64, rule: &R) -> Result<()> {
    let slot = rules
        .get_mut(index as usize)
        .ok_or_else(|| ProxyError::NotFound(format!("rule {}", index)))?;
    *slot = rule.clone();
    Ok(())
}

fn remove_at<R: Indexed>(rules: &mut Vec<R>, index: i64) -> Result<()> {
    if index < 0 || index as usize >= rules.len() {
        return Err(ProxyError::NotFound(format!("rule {}", index)));
    }
    rules.remove(index as usize);
    reindex(rules);
    Ok(())
}

impl FakeDataPlane {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The committed configuration.
    pub fn snapshot(&self) -> ProxySnapshot {
        self.state.lock().committed.clone()
    }

    /// Make the next `n` commits fail with a server error.
    pub fn fail_commits(&self, n: usize) {
        self.state.lock().failing_commits = n;
    }

    /// Make the next `n` transaction openings fail.
    pub fn fail_begins(&self, n: usize) {
        self.state.lock().failing_begins = n;
    }

    /// Make the next `n` commits land, then hold the answer back for `delay`.
    pub fn stall_commits(&self, n: usize, delay: Duration) {
        let mut state = self.state.lock();
        state.stalled_commits = n;
        state.stall = delay;
    }

    pub fn open_transactions(&self) -> usize {
        self.state.lock().transactions.len()
    }

    pub fn commits(&self) -> usize {
        self.state.lock().commits
    }

    fn read<T>(&self, tx: Option<&TransactionId>, f: impl FnOnce(&ProxySnapshot) -> T) -> Result<T> {
        let state = self.state.lock();
        match tx {
            None => Ok(f(&state.committed)),
            Some(tx) => state
                .transactions
                .get(tx.as_str())
                .map(f)
                .ok_or_else(|| ProxyError::NotFound(format!("transaction {}", tx))),
        }
    }

    fn stage<T>(
        &self,
        tx: &TransactionId,
        f: impl FnOnce(&mut ProxySnapshot) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state.lock();
        let staged = state
            .transactions
            .get_mut(tx.as_str())
            .ok_or_else(|| ProxyError::NotFound(format!("transaction {}", tx)))?;
        f(staged)
    }
}

#[async_trait]
impl DataPlane for FakeDataPlane {
    async fn configuration_version(&self) -> Result<i64> {
        Ok(self.state.lock().committed.version)
    }

    async fn start_transaction(&self, version: i64) -> Result<TransactionId> {
        let mut state = self.state.lock();
        if state.failing_begins > 0 {
            state.failing_begins -= 1;
            return Err(ProxyError::Unreachable("connection reset".to_string()));
        }
        if version != state.committed.version {
            return Err(ProxyError::Conflict(format!(
                "version {} is stale, current is {}",
                version, state.committed.version
            )));
        }
        state.next_tx += 1;
        let id = format!("tx-{}", state.next_tx);
        let staged = state.committed.clone();
        state.transactions.insert(id.clone(), staged);
        Ok(TransactionId::new(id))
    }

    async fn commit_transaction(&self, tx: &TransactionId) -> Result<()> {
        let stall = {
            let mut state = self.state.lock();
            if !state.transactions.contains_key(tx.as_str()) {
                return Err(ProxyError::NotFound(format!("transaction {}", tx)));
            }
            if state.failing_commits > 0 {
                state.failing_commits -= 1;
                return Err(ProxyError::Api {
                    status: 500,
                    message: "reload failed".to_string(),
                });
            }
            if let Some(mut staged) = state.transactions.remove(tx.as_str()) {
                staged.version = state.committed.version + 1;
                state.committed = staged;
                state.commits += 1;
            }
            if state.stalled_commits > 0 {
                state.stalled_commits -= 1;
                Some(state.stall)
            } else {
                None
            }
        };
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn delete_transaction(&self, tx: &TransactionId) -> Result<()> {
        self.state
            .lock()
            .transactions
            .remove(tx.as_str())
            .map(|_| ())
            .ok_or_else(|| ProxyError::NotFound(format!("transaction {}", tx)))
    }

    async fn http_request_rules(
        &self,
        _frontend: &str,
        tx: Option<&TransactionId>,
    ) -> Result<Vec<HttpRequestRule>> {
        self.read(tx, |s| s.requests.clone())
    }

    async fn create_http_request_rule(
        &self,
        _frontend: &str,
        rule: &HttpRequestRule,
        tx: &TransactionId,
    ) -> Result<()> {
        self.stage(tx, |s| {
            insert_at(&mut s.requests, rule.index, rule);
            Ok(())
        })
    }

    async fn replace_http_request_rule(
        &self,
        _frontend: &str,
        rule: &HttpRequestRule,
        tx: &TransactionId,
    ) -> Result<()> {
        self.stage(tx, |s| replace_at(&mut s.requests, rule.index, rule))
    }

    async fn delete_http_request_rule(
        &self,
        _frontend: &str,
        index: i64,
        tx: &TransactionId,
    ) -> Result<()> {
        self.stage(tx, |s| remove_at(&mut s.requests, index))
    }

    async fn backend_switching_rules(
        &self,
        _frontend: &str,
        tx: Option<&TransactionId>,
    ) -> Result<Vec<BackendSwitchingRule>> {
        self.read(tx, |s| s.switching.clone())
    }

    async fn create_backend_switching_rule(
        &self,
        _frontend: &str,
        rule: &BackendSwitchingRule,
        tx: &TransactionId,
    ) -> Result<()> {
        self.stage(tx, |s| {
            insert_at(&mut s.switching, rule.index, rule);
            Ok(())
        })
    }

    async fn replace_backend_switching_rule(
        &self,
        _frontend: &str,
        rule: &BackendSwitchingRule,
        tx: &TransactionId,
    ) -> Result<()> {
        self.stage(tx, |s| replace_at(&mut s.switching, rule.index, rule))
    }

    async fn delete_backend_switching_rule(
        &self,
        _frontend: &str,
        index: i64,
        tx: &TransactionId,
    ) -> Result<()> {
        self.stage(tx, |s| remove_at(&mut s.switching, index))
    }

    async fn backend_exists(&self, name: &str, tx: Option<&TransactionId>) -> Result<bool> {
        self.read(tx, |s| s.backends.contains_key(name))
    }

    async fn create_backend(&self, backend: &Backend, tx: &TransactionId) -> Result<()> {
        self.stage(tx, |s| {
            if s.backends.contains_key(&backend.name) {
                return Err(ProxyError::Conflict(format!("backend {}", backend.name)));
            }
            s.backends.insert(backend.name.clone(), Vec::new());
            Ok(())
        })
    }

    async fn delete_backend(&self, name: &str, tx: &TransactionId) -> Result<()> {
        self.stage(tx, |s| {
            s.backends
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| ProxyError::NotFound(format!("backend {}", name)))
        })
    }

    async fn create_server(&self, backend: &str, server: &Server, tx: &TransactionId) -> Result<()> {
        self.stage(tx, |s| {
            s.backends
                .get_mut(backend)
                .ok_or_else(|| ProxyError::NotFound(format!("backend {}", backend)))?
                .push(server.clone());
            Ok(())
        })
    }

    async fn servers(&self, backend: &str, tx: Option<&TransactionId>) -> Result<Vec<Server>> {
        self.read(tx, |s| s.backends.get(backend).cloned())?
            .ok_or_else(|| ProxyError::NotFound(format!("backend {}", backend)))
    }
}
