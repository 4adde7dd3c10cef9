// ABOUTME: Transport seam for the HAProxy Data Plane API and its HTTP implementation.
// ABOUTME: One hyper http1 connection per request, basic auth, JSON bodies.

use super::error::{ProxyError, Result};
use super::types::{
    Backend, BackendSwitchingRule, HttpRequestRule, Server, TransactionRecord, Versioned,
};
use crate::types::TransactionId;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::net::TcpStream;

const API_PREFIX: &str = "/v2/services/haproxy";

/// Typed operations of the Data Plane API that the transaction client uses.
///
/// Reads pass `tx` to see the staged configuration of an open transaction;
/// `None` reads the committed configuration.
#[async_trait]
pub trait DataPlane: Send + Sync {
    async fn configuration_version(&self) -> Result<i64>;

    async fn start_transaction(&self, version: i64) -> Result<TransactionId>;

    async fn commit_transaction(&self, tx: &TransactionId) -> Result<()>;

    async fn delete_transaction(&self, tx: &TransactionId) -> Result<()>;

    async fn http_request_rules(
        &self,
        frontend: &str,
        tx: Option<&TransactionId>,
    ) -> Result<Vec<HttpRequestRule>>;

    async fn create_http_request_rule(
        &self,
        frontend: &str,
        rule: &HttpRequestRule,
        tx: &TransactionId,
    ) -> Result<()>;

    async fn replace_http_request_rule(
        &self,
        frontend: &str,
        rule: &HttpRequestRule,
        tx: &TransactionId,
    ) -> Result<()>;

    async fn delete_http_request_rule(
        &self,
        frontend: &str,
        index: i64,
        tx: &TransactionId,
    ) -> Result<()>;

    async fn backend_switching_rules(
        &self,
        frontend: &str,
        tx: Option<&TransactionId>,
    ) -> Result<Vec<BackendSwitchingRule>>;

    async fn create_backend_switching_rule(
        &self,
        frontend: &str,
        rule: &BackendSwitchingRule,
        tx: &TransactionId,
    ) -> Result<()>;

    async fn replace_backend_switching_rule(
        &self,
        frontend: &str,
        rule: &BackendSwitchingRule,
        tx: &TransactionId,
    ) -> Result<()>;

    async fn delete_backend_switching_rule(
        &self,
        frontend: &str,
        index: i64,
        tx: &TransactionId,
    ) -> Result<()>;

    async fn backend_exists(&self, name: &str, tx: Option<&TransactionId>) -> Result<bool>;

    async fn create_backend(&self, backend: &Backend, tx: &TransactionId) -> Result<()>;

    async fn delete_backend(&self, name: &str, tx: &TransactionId) -> Result<()>;

    async fn create_server(&self, backend: &str, server: &Server, tx: &TransactionId)
    -> Result<()>;

    async fn servers(&self, backend: &str, tx: Option<&TransactionId>) -> Result<Vec<Server>>;
}

/// Data Plane API client over plain HTTP.
pub struct HttpDataPlane {
    host: String,
    port: u16,
    authority: String,
    base_path: String,
    authorization: String,
    timeout: Duration,
}

impl HttpDataPlane {
    pub fn new(url: &str, username: &str, password: &str, timeout: Duration) -> Result<Self> {
        let uri: hyper::Uri = url
            .parse()
            .map_err(|e| ProxyError::InvalidUrl(format!("{}: {}", url, e)))?;

        match uri.scheme_str() {
            Some("http") | None => {}
            Some(other) => {
                return Err(ProxyError::InvalidUrl(format!(
                    "unsupported scheme '{}' in {}",
                    other, url
                )));
            }
        }

        let host = uri
            .host()
            .ok_or_else(|| ProxyError::InvalidUrl(format!("missing host in {}", url)))?
            .to_string();
        let port = uri.port_u16().unwrap_or(80);
        let credentials = BASE64.encode(format!("{}:{}", username, password));

        Ok(Self {
            authority: format!("{}:{}", host, port),
            host,
            port,
            base_path: uri.path().trim_end_matches('/').to_string(),
            authorization: format!("Basic {}", credentials),
            timeout,
        })
    }

    fn path(&self, endpoint: &str, params: &[(&str, &str)]) -> String {
        let mut path = format!("{}{}{}", self.base_path, API_PREFIX, endpoint);
        for (i, (key, value)) in params.iter().enumerate() {
            path.push(if i == 0 { '?' } else { '&' });
            path.push_str(key);
            path.push('=');
            path.push_str(&urlencoding::encode(value));
        }
        path
    }

    async fn send(&self, method: Method, path: String, body: Option<Vec<u8>>) -> Result<Bytes> {
        let (status, bytes) = tokio::time::timeout(self.timeout, self.exchange(method, &path, body))
            .await
            .map_err(|_| ProxyError::Timeout)??;

        if status.is_success() {
            return Ok(bytes);
        }

        let message = error_message(&bytes);
        Err(match status {
            StatusCode::NOT_FOUND => ProxyError::NotFound(message),
            StatusCode::CONFLICT => ProxyError::Conflict(message),
            other => ProxyError::Api {
                status: other.as_u16(),
                message,
            },
        })
    }

    async fn exchange(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<(StatusCode, Bytes)> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| ProxyError::Unreachable(format!("{}: {}", self.authority, e)))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ProxyError::Unreachable(format!("HTTP handshake failed: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!("data plane connection error: {}", e);
            }
        });

        let req = hyper::Request::builder()
            .method(method)
            .uri(path)
            .header(hyper::header::HOST, &self.authority)
            .header(hyper::header::AUTHORIZATION, &self.authorization)
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| ProxyError::InvalidResponse(format!("failed to build request: {}", e)))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ProxyError::Unreachable(format!("request failed: {}", e)))?;

        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ProxyError::Unreachable(format!("failed to read response: {}", e)))?
            .to_bytes();

        tracing::debug!(%status, path, "Data plane response");
        Ok((status, body))
    }

    async fn get<T: DeserializeOwned>(&self, path: String) -> Result<T> {
        let bytes = self.send(Method::GET, path, None).await?;
        serde_json::from_slice(&bytes).map_err(|e| ProxyError::InvalidResponse(e.to_string()))
    }

    async fn write<B: Serialize + Sync>(&self, method: Method, path: String, body: &B) -> Result<Bytes> {
        let json =
            serde_json::to_vec(body).map_err(|e| ProxyError::InvalidResponse(e.to_string()))?;
        self.send(method, path, Some(json)).await
    }
}

fn error_message(body: &[u8]) -> String {
    #[derive(serde::Deserialize)]
    struct ApiError {
        message: String,
    }
    serde_json::from_slice::<ApiError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string())
}

fn rule_params<'a>(frontend: &'a str, tx: Option<&'a TransactionId>) -> Vec<(&'a str, &'a str)> {
    let mut params = vec![("parent_type", "frontend"), ("parent_name", frontend)];
    if let Some(tx) = tx {
        params.push(("transaction_id", tx.as_str()));
    }
    params
}

fn switching_params<'a>(frontend: &'a str, tx: Option<&'a TransactionId>) -> Vec<(&'a str, &'a str)> {
    let mut params = vec![("frontend", frontend)];
    if let Some(tx) = tx {
        params.push(("transaction_id", tx.as_str()));
    }
    params
}

fn tx_params(tx: Option<&TransactionId>) -> Vec<(&str, &str)> {
    tx.map(|tx| vec![("transaction_id", tx.as_str())])
        .unwrap_or_default()
}

#[async_trait]
impl DataPlane for HttpDataPlane {
    async fn configuration_version(&self) -> Result<i64> {
        self.get(self.path("/configuration/version", &[])).await
    }

    async fn start_transaction(&self, version: i64) -> Result<TransactionId> {
        let version = version.to_string();
        let bytes = self
            .send(
                Method::POST,
                self.path("/transactions", &[("version", &version)]),
                None,
            )
            .await?;
        let record: TransactionRecord =
            serde_json::from_slice(&bytes).map_err(|e| ProxyError::InvalidResponse(e.to_string()))?;
        Ok(TransactionId::new(record.id))
    }

    async fn commit_transaction(&self, tx: &TransactionId) -> Result<()> {
        let path = self.path(&format!("/transactions/{}", tx), &[]);
        self.send(Method::PUT, path, None).await?;
        Ok(())
    }

    async fn delete_transaction(&self, tx: &TransactionId) -> Result<()> {
        let path = self.path(&format!("/transactions/{}", tx), &[]);
        self.send(Method::DELETE, path, None).await?;
        Ok(())
    }

    async fn http_request_rules(
        &self,
        frontend: &str,
        tx: Option<&TransactionId>,
    ) -> Result<Vec<HttpRequestRule>> {
        let path = self.path("/configuration/http_request_rules", &rule_params(frontend, tx));
        let list: Versioned<Vec<HttpRequestRule>> = self.get(path).await?;
        Ok(list.data)
    }

    async fn create_http_request_rule(
        &self,
        frontend: &str,
        rule: &HttpRequestRule,
        tx: &TransactionId,
    ) -> Result<()> {
        let path = self.path(
            "/configuration/http_request_rules",
            &rule_params(frontend, Some(tx)),
        );
        self.write(Method::POST, path, rule).await?;
        Ok(())
    }

    async fn replace_http_request_rule(
        &self,
        frontend: &str,
        rule: &HttpRequestRule,
        tx: &TransactionId,
    ) -> Result<()> {
        let path = self.path(
            &format!("/configuration/http_request_rules/{}", rule.index),
            &rule_params(frontend, Some(tx)),
        );
        self.write(Method::PUT, path, rule).await?;
        Ok(())
    }

    async fn delete_http_request_rule(
        &self,
        frontend: &str,
        index: i64,
        tx: &TransactionId,
    ) -> Result<()> {
        let path = self.path(
            &format!("/configuration/http_request_rules/{}", index),
            &rule_params(frontend, Some(tx)),
        );
        self.send(Method::DELETE, path, None).await?;
        Ok(())
    }

    async fn backend_switching_rules(
        &self,
        frontend: &str,
        tx: Option<&TransactionId>,
    ) -> Result<Vec<BackendSwitchingRule>> {
        let path = self.path(
            "/configuration/backend_switching_rules",
            &switching_params(frontend, tx),
        );
        let list: Versioned<Vec<BackendSwitchingRule>> = self.get(path).await?;
        Ok(list.data)
    }

    async fn create_backend_switching_rule(
        &self,
        frontend: &str,
        rule: &BackendSwitchingRule,
        tx: &TransactionId,
    ) -> Result<()> {
        let path = self.path(
            "/configuration/backend_switching_rules",
            &switching_params(frontend, Some(tx)),
        );
        self.write(Method::POST, path, rule).await?;
        Ok(())
    }

    async fn replace_backend_switching_rule(
        &self,
        frontend: &str,
        rule: &BackendSwitchingRule,
        tx: &TransactionId,
    ) -> Result<()> {
        let path = self.path(
            &format!("/configuration/backend_switching_rules/{}", rule.index),
            &switching_params(frontend, Some(tx)),
        );
        self.write(Method::PUT, path, rule).await?;
        Ok(())
    }

    async fn delete_backend_switching_rule(
        &self,
        frontend: &str,
        index: i64,
        tx: &TransactionId,
    ) -> Result<()> {
        let path = self.path(
            &format!("/configuration/backend_switching_rules/{}", index),
            &switching_params(frontend, Some(tx)),
        );
        self.send(Method::DELETE, path, None).await?;
        Ok(())
    }

    async fn backend_exists(&self, name: &str, tx: Option<&TransactionId>) -> Result<bool> {
        let path = self.path(&format!("/configuration/backends/{}", name), &tx_params(tx));
        match self.send(Method::GET, path, None).await {
            Ok(_) => Ok(true),
            Err(ProxyError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_backend(&self, backend: &Backend, tx: &TransactionId) -> Result<()> {
        let path = self.path("/configuration/backends", &tx_params(Some(tx)));
        self.write(Method::POST, path, backend).await?;
        Ok(())
    }

    async fn delete_backend(&self, name: &str, tx: &TransactionId) -> Result<()> {
        let path = self.path(
            &format!("/configuration/backends/{}", name),
            &tx_params(Some(tx)),
        );
        self.send(Method::DELETE, path, None).await?;
        Ok(())
    }

    async fn create_server(
        &self,
        backend: &str,
        server: &Server,
        tx: &TransactionId,
    ) -> Result<()> {
        let path = self.path(
            "/configuration/servers",
            &[("backend", backend), ("transaction_id", tx.as_str())],
        );
        self.write(Method::POST, path, server).await?;
        Ok(())
    }

    async fn servers(&self, backend: &str, tx: Option<&TransactionId>) -> Result<Vec<Server>> {
        let mut params = vec![("backend", backend)];
        params.extend(tx_params(tx));
        let list: Versioned<Vec<Server>> =
            self.get(self.path("/configuration/servers", &params)).await?;
        Ok(list.data)
    }
}
