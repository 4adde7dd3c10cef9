// ABOUTME: HAProxy Data Plane API client with begin/mutate/commit/abort transactions.
// ABOUTME: Backends, host switching rules and force-SSL redirects.

mod client;
mod dataplane;
mod error;
mod types;

pub use client::{DEFAULT_REQUEST_TIMEOUT, ProxyClient, Transaction};
pub use dataplane::{DataPlane, HttpDataPlane};
pub use error::{ProxyError, Result};
pub use types::{
    Backend, BackendSwitchingRule, HostCondition, HttpRequestRule, Server, TransactionRecord,
    Versioned, find_rule_index,
};
