// ABOUTME: Transactional client over the Data Plane API: begin, mutate, commit, abort.
// ABOUTME: Mutations are staged in a transaction and become visible only on commit.

use super::dataplane::DataPlane;
use super::error::{ProxyError, Result};
use super::types::{
    Backend, BackendSwitchingRule, HostCondition, HttpRequestRule, Server, find_rule_index,
};
use crate::types::TransactionId;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Attempts made by [`ProxyClient::apply`] when a transaction fails to open or commit.
const TRANSACTION_ATTEMPTS: usize = 2;

/// Bound on each Data Plane request unless configured otherwise.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct ProxyClient {
    plane: Arc<dyn DataPlane>,
    frontend: String,
    request_timeout: Duration,
}

/// An open transaction. Cloning shares the same transaction id.
#[derive(Clone)]
pub struct Transaction {
    id: TransactionId,
    plane: Arc<dyn DataPlane>,
    frontend: String,
}

impl ProxyClient {
    pub fn new(plane: Arc<dyn DataPlane>, frontend: impl Into<String>) -> Self {
        Self {
            plane,
            frontend: frontend.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound every request made through this client, including a whole
    /// mutation step of [`ProxyClient::apply`].
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn frontend(&self) -> &str {
        &self.frontend
    }

    async fn timed<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .unwrap_or(Err(ProxyError::Timeout))
    }

    pub async fn begin(&self) -> Result<Transaction> {
        let version = self.timed(self.plane.configuration_version()).await?;
        let id = self.timed(self.plane.start_transaction(version)).await?;
        tracing::debug!(transaction = %id, version, "Opened proxy transaction");
        Ok(Transaction {
            id,
            plane: Arc::clone(&self.plane),
            frontend: self.frontend.clone(),
        })
    }

    pub async fn commit(&self, tx: Transaction) -> Result<()> {
        self.timed(self.plane.commit_transaction(&tx.id)).await?;
        tracing::info!(transaction = %tx.id, "Committed proxy transaction");
        Ok(())
    }

    /// Discard a transaction. A transaction that is already gone counts as aborted.
    pub async fn abort(&self, tx: Transaction) -> Result<()> {
        match self.timed(self.plane.delete_transaction(&tx.id)).await {
            Ok(()) | Err(ProxyError::NotFound(_)) => {
                tracing::info!(transaction = %tx.id, "Aborted proxy transaction");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Committed servers of `backend`; empty when the backend does not exist.
    pub async fn servers(&self, backend: &str) -> Result<Vec<Server>> {
        match self.timed(self.plane.servers(backend, None)).await {
            Err(ProxyError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    /// Run `mutate` inside a transaction and commit it.
    ///
    /// A mutation error aborts the transaction and is returned as is. A
    /// failure to open or commit the transaction aborts and replays the whole
    /// transaction once; a second failure is reported as
    /// [`ProxyError::BeginFailed`] or [`ProxyError::CommitFailed`].
    pub async fn apply<F, Fut>(&self, mutate: F) -> Result<()>
    where
        F: Fn(Transaction) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.apply_confirmed(mutate, || async { Ok(false) }).await
    }

    /// Like [`ProxyClient::apply`], but a commit whose outcome is unknown is
    /// checked with `confirm` against the committed configuration after the
    /// abort. A confirmed commit counts as success and is not replayed.
    pub async fn apply_confirmed<F, Fut, C, CFut>(&self, mutate: F, confirm: C) -> Result<()>
    where
        F: Fn(Transaction) -> Fut,
        Fut: Future<Output = Result<()>>,
        C: Fn() -> CFut,
        CFut: Future<Output = Result<bool>>,
    {
        let mut last_failure = ProxyError::BeginFailed("no transaction attempted".to_string());

        for attempt in 1..=TRANSACTION_ATTEMPTS {
            let tx = match self.begin().await {
                Ok(tx) => tx,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Could not open proxy transaction");
                    last_failure = ProxyError::BeginFailed(e.to_string());
                    continue;
                }
            };
            let id = tx.id.clone();

            if let Err(e) = self.timed(mutate(tx.clone())).await {
                tracing::warn!(transaction = %id, error = %e, "Proxy mutation failed, aborting");
                self.abort_logged(tx).await;
                return Err(e);
            }

            let e = match self.timed(self.plane.commit_transaction(&id)).await {
                Ok(()) => {
                    tracing::info!(transaction = %id, attempt, "Committed proxy transaction");
                    return Ok(());
                }
                Err(e) => e,
            };
            tracing::warn!(transaction = %id, attempt, error = %e, "Proxy commit failed");
            self.abort_logged(tx).await;

            match self.timed(confirm()).await {
                Ok(true) => {
                    tracing::info!(transaction = %id, attempt, "Proxy commit confirmed after failure report");
                    return Ok(());
                }
                Ok(false) => {}
                Err(check) => {
                    tracing::warn!(transaction = %id, error = %check, "Could not read committed proxy configuration");
                }
            }
            last_failure = ProxyError::CommitFailed {
                transaction: id.into_inner(),
                message: e.to_string(),
            };
        }

        Err(last_failure)
    }

    async fn abort_logged(&self, tx: Transaction) {
        let id = tx.id.clone();
        if let Err(e) = self.abort(tx).await {
            tracing::warn!(transaction = %id, error = %e, "Failed to abort proxy transaction");
        }
    }

    /// Redirect plain HTTP to HTTPS for `host`.
    pub async fn enable_force_ssl(&self, host: &str) -> Result<()> {
        self.apply(|tx| async move { tx.ensure_force_ssl(host).await })
            .await
    }

    pub async fn disable_force_ssl(&self, host: &str) -> Result<()> {
        self.apply(|tx| async move { tx.remove_force_ssl(host).await })
            .await
    }

    /// Drop a deployment's backend together with its host rules.
    pub async fn remove_route(&self, backend: &str, host: Option<&str>) -> Result<()> {
        self.apply(|tx| async move {
            if let Some(host) = host {
                tx.delete_switching_rule(host).await?;
                tx.remove_force_ssl(host).await?;
            }
            tx.delete_backend(backend).await
        })
        .await
    }
}

impl Transaction {
    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub async fn http_request_rules(&self) -> Result<Vec<HttpRequestRule>> {
        self.plane
            .http_request_rules(&self.frontend, Some(&self.id))
            .await
    }

    pub async fn add_rule(&self, rule: &HttpRequestRule) -> Result<()> {
        self.plane
            .create_http_request_rule(&self.frontend, rule, &self.id)
            .await
    }

    pub async fn replace_rule(&self, rule: &HttpRequestRule) -> Result<()> {
        self.plane
            .replace_http_request_rule(&self.frontend, rule, &self.id)
            .await
    }

    pub async fn delete_rule(&self, index: i64) -> Result<()> {
        self.plane
            .delete_http_request_rule(&self.frontend, index, &self.id)
            .await
    }

    /// Point `backend` at exactly one server, dropping whatever it had.
    pub async fn replace_backend(&self, backend: &str, server: &Server) -> Result<()> {
        if self.plane.backend_exists(backend, Some(&self.id)).await? {
            self.plane.delete_backend(backend, &self.id).await?;
        }
        self.plane
            .create_backend(&Backend::http(backend), &self.id)
            .await?;
        self.plane.create_server(backend, server, &self.id).await
    }

    pub async fn delete_backend(&self, backend: &str) -> Result<()> {
        match self.plane.delete_backend(backend, &self.id).await {
            Ok(()) | Err(ProxyError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Route requests for `host` to `backend`, updating an existing rule in place.
    pub async fn ensure_switching_rule(&self, host: &str, backend: &str) -> Result<()> {
        let rules = self
            .plane
            .backend_switching_rules(&self.frontend, Some(&self.id))
            .await?;

        match find_rule_index(&rules, host) {
            Some(index) => {
                let rule = BackendSwitchingRule::for_host(host, backend, index);
                self.plane
                    .replace_backend_switching_rule(&self.frontend, &rule, &self.id)
                    .await
            }
            None => {
                let rule = BackendSwitchingRule::for_host(host, backend, 0);
                self.plane
                    .create_backend_switching_rule(&self.frontend, &rule, &self.id)
                    .await
            }
        }
    }

    pub async fn delete_switching_rule(&self, host: &str) -> Result<()> {
        let rules = self
            .plane
            .backend_switching_rules(&self.frontend, Some(&self.id))
            .await?;
        delete_matching(&rules, host, |index| async move {
            self.plane
                .delete_backend_switching_rule(&self.frontend, index, &self.id)
                .await
        })
        .await
    }

    pub async fn ensure_force_ssl(&self, host: &str) -> Result<()> {
        let rules = self.http_request_rules().await?;
        match find_rule_index(&rules, host) {
            Some(index) => {
                self.replace_rule(&HttpRequestRule::force_ssl(host, index))
                    .await
            }
            None => self.add_rule(&HttpRequestRule::force_ssl(host, 0)).await,
        }
    }

    pub async fn remove_force_ssl(&self, host: &str) -> Result<()> {
        let rules = self.http_request_rules().await?;
        delete_matching(&rules, host, |index| self.delete_rule(index)).await
    }
}

/// Delete every rule mentioning `host`, highest index first so the
/// remaining indices stay valid.
async fn delete_matching<R, F, Fut>(rules: &[R], host: &str, delete: F) -> Result<()>
where
    R: HostCondition,
    F: Fn(i64) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut indices: Vec<i64> = rules
        .iter()
        .filter(|rule| rule.mentions_host(host))
        .map(|rule| rule.index())
        .collect();
    indices.sort_unstable_by(|a, b| b.cmp(a));

    for index in indices {
        delete(index).await?;
    }
    Ok(())
}
