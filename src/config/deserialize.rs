// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles shorthand engine entries and optional domains.

use serde::Deserialize;
use std::collections::HashMap;

use super::engine::{EngineConfig, EngineEntry};
use crate::types::Domain;

pub fn deserialize_engines<'de, D>(deserializer: D) -> Result<HashMap<String, EngineConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entries: HashMap<String, EngineEntry> = HashMap::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .map(|(name, entry)| (name, entry.into()))
        .collect())
}

/// Empty strings mean "no domain", matching unset fields.
pub fn deserialize_domain_option<'de, D>(deserializer: D) -> Result<Option<Domain>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => Domain::parse(&s).map(Some).map_err(serde::de::Error::custom),
    }
}
