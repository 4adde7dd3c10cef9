// ABOUTME: Public domain a deployment is served on, with its scheme.
// ABOUTME: Parses "https://app.example.com" into host and TLS flag.

use super::PreviewId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain cannot be empty")]
    Empty,

    #[error("unsupported scheme in domain: {0}")]
    UnsupportedScheme(String),

    #[error("invalid character in domain: '{0}'")]
    InvalidChar(char),

    #[error("domain must not contain a path: {0}")]
    HasPath(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain {
    host: String,
    https: bool,
}

impl Domain {
    /// Parse a fully qualified domain. A missing scheme means plain HTTP.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let trimmed = value.trim().trim_end_matches('/');
        let (https, rest) = if let Some(rest) = trimmed.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            (false, rest)
        } else if let Some((scheme, _)) = trimmed.split_once("://") {
            return Err(DomainError::UnsupportedScheme(scheme.to_string()));
        } else {
            (false, trimmed)
        };

        if rest.is_empty() {
            return Err(DomainError::Empty);
        }
        if rest.contains('/') {
            return Err(DomainError::HasPath(value.to_string()));
        }
        for c in rest.chars() {
            if !c.is_ascii_alphanumeric() && c != '-' && c != '.' {
                return Err(DomainError::InvalidChar(c));
            }
        }

        Ok(Self {
            host: rest.to_ascii_lowercase(),
            https,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_https(&self) -> bool {
        self.https
    }

    /// Domain for a pull-request preview: `<id>.<host>`, same scheme.
    pub fn for_preview(&self, preview: PreviewId) -> Self {
        Self {
            host: format!("{}.{}", preview, self.host),
            https: self.https,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.https { "https" } else { "http" };
        write!(f, "{}://{}", scheme, self.host)
    }
}

impl Serialize for Domain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Domain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Domain::parse(&value).map_err(serde::de::Error::custom)
    }
}
