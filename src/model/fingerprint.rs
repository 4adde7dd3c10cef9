// ABOUTME: Configuration fingerprint of a deployment target.
// ABOUTME: Hex SHA-256 over the canonical JSON of the build-affecting fields.

use super::BuildPack;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigFingerprint(String);

/// Field order here is the canonical JSON key order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintInput<'a> {
    build_pack: BuildPack,
    port: Option<u16>,
    install_command: Option<&'a str>,
    build_command: Option<&'a str>,
    start_command: Option<&'a str>,
}

impl ConfigFingerprint {
    pub fn compute(
        build_pack: BuildPack,
        port: Option<u16>,
        install_command: Option<&str>,
        build_command: Option<&str>,
        start_command: Option<&str>,
    ) -> Self {
        let input = FingerprintInput {
            build_pack,
            port,
            install_command,
            build_command,
            start_command,
        };
        // Serializing a struct of plain fields into a Vec cannot fail.
        let json = serde_json::to_vec(&input).unwrap_or_default();
        let digest = Sha256::digest(&json);
        Self(hex::encode(digest))
    }

    pub fn from_hex(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_digest_shape() {
        let fp = ConfigFingerprint::compute(
            BuildPack::Node,
            Some(3000),
            Some("npm install"),
            Some("npm run build"),
            Some("npm run start"),
        );
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_is_lowercase_hex_sha256() {
        let fp = ConfigFingerprint::compute(BuildPack::Static, Some(80), None, Some("make"), None);
        assert_eq!(
            fp.as_str(),
            "26cf76ac8b9476684dca45bcb5fb02a809ec786a250bcd498977fc5af12a7d40"
        );
    }

    #[test]
    fn canonical_json_uses_camel_case_keys_in_order() {
        let input = FingerprintInput {
            build_pack: BuildPack::Static,
            port: Some(80),
            install_command: None,
            build_command: Some("make"),
            start_command: None,
        };
        let json = serde_json::to_string(&input).unwrap();
        assert_eq!(
            json,
            r#"{"buildPack":"static","port":80,"installCommand":null,"buildCommand":"make","startCommand":null}"#
        );
    }
}
