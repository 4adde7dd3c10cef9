// ABOUTME: Request and response payloads of the HAProxy Data Plane API v2.
// ABOUTME: Rules, backends, servers and transaction records.

use serde::{Deserialize, Serialize};

/// `http-request` rule of a frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequestRule {
    pub index: i64,
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cond: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cond_test: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redir_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redir_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redir_code: Option<u16>,
}

impl HttpRequestRule {
    /// Redirect plain HTTP requests for `host` to HTTPS.
    pub fn force_ssl(host: &str, index: i64) -> Self {
        Self {
            index,
            rule_type: "redirect".to_string(),
            cond: Some("if".to_string()),
            cond_test: Some(format!("{{ hdr(Host) -i {} }} !{{ ssl_fc }}", host)),
            redir_type: Some("scheme".to_string()),
            redir_value: Some("https".to_string()),
            redir_code: Some(301),
        }
    }
}

/// `use_backend` rule of a frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSwitchingRule {
    pub index: i64,
    /// Backend to switch to.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cond: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cond_test: Option<String>,
}

impl BackendSwitchingRule {
    pub fn for_host(host: &str, backend: &str, index: i64) -> Self {
        Self {
            index,
            name: backend.to_string(),
            cond: Some("if".to_string()),
            cond_test: Some(format!("{{ req.hdr(host) -i {} }}", host)),
        }
    }
}

/// Anything with a host condition.
pub trait HostCondition {
    fn index(&self) -> i64;
    fn cond_test(&self) -> Option<&str>;

    /// True when the condition names `host` as a whole token.
    fn mentions_host(&self, host: &str) -> bool {
        self.cond_test()
            .is_some_and(|test| test.split_whitespace().any(|token| token == host))
    }
}

impl HostCondition for HttpRequestRule {
    fn index(&self) -> i64 {
        self.index
    }

    fn cond_test(&self) -> Option<&str> {
        self.cond_test.as_deref()
    }
}

impl HostCondition for BackendSwitchingRule {
    fn index(&self) -> i64 {
        self.index
    }

    fn cond_test(&self) -> Option<&str> {
        self.cond_test.as_deref()
    }
}

/// Index of the first rule whose condition mentions `host`.
pub fn find_rule_index<R: HostCondition>(rules: &[R], host: &str) -> Option<i64> {
    rules
        .iter()
        .find(|rule| rule.mentions_host(host))
        .map(|rule| rule.index())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl Backend {
    pub fn http(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: Some("http".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
}

impl Server {
    pub fn new(name: &str, address: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
            port: Some(port),
            check: Some("enabled".to_string()),
        }
    }
}

/// `{"_version": n, "data": ...}` wrapper of configuration reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Versioned<T> {
    #[serde(rename = "_version", default)]
    pub version: Option<i64>,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "_version", default)]
    pub version: Option<i64>,
}
