//! # Capability Advertisement
//!
//! First application message on every connection. Advertises the protocol
//! versions a node implements and the metadata plugins it runs.
//!
//! Protocol ids:
//!
//! | Id | Protocol |
//! |----|----------|
//! | 1  | capability negotiation |
//! | 2  | request/response messaging |
//! | 3  | address authentication |
//! | 4  | peer announce relay |

use super::errors::RejectReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CAPABILITY_PROTOCOL: u32 = 1;
pub const MESSAGING_PROTOCOL: u32 = 2;
pub const AUTHENTICATION_PROTOCOL: u32 = 3;
pub const ANNOUNCE_PROTOCOL: u32 = 4;

/// Lowest capability protocol version this node accepts.
pub const MIN_CAPABILITY_VERSION: u32 = 1;

/// Protocol versions this build implements.
pub const IMPLEMENTED_PROTOCOLS: [(u32, u32); 4] = [
    (CAPABILITY_PROTOCOL, 1),
    (MESSAGING_PROTOCOL, 1),
    (AUTHENTICATION_PROTOCOL, 1),
    (ANNOUNCE_PROTOCOL, 1),
];

/// A node's advertised capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub user_agent: String,
    /// Protocol id to supported version. Older nodes send this as `hips`.
    #[serde(alias = "hips")]
    pub protocol_versions: BTreeMap<u32, u32>,
    #[serde(default)]
    pub plugins: Vec<String>,
}

impl Capability {
    /// Capability of this build with the given installed plugins.
    pub fn local(plugins: Vec<String>) -> Self {
        Self {
            user_agent: default_user_agent(),
            protocol_versions: IMPLEMENTED_PROTOCOLS.into_iter().collect(),
            plugins,
        }
    }

    /// Check the capability protocol entry against the local minimum.
    pub fn validate(&self, min_version: u32) -> Result<(), RejectReason> {
        match self.protocol_versions.get(&CAPABILITY_PROTOCOL) {
            None => Err(RejectReason::MissingCapabilityProtocol),
            Some(&advertised) if advertised < min_version => Err(RejectReason::VersionTooLow {
                advertised,
                required: min_version,
            }),
            Some(_) => Ok(()),
        }
    }

    pub fn supports_protocol(&self, id: u32, min_version: u32) -> bool {
        self.protocol_versions
            .get(&id)
            .is_some_and(|&version| version >= min_version)
    }

    pub fn has_plugin(&self, plugin_id: &str) -> bool {
        self.plugins.iter().any(|p| p == plugin_id)
    }
}

pub fn default_user_agent() -> String {
    format!("Hydrabase/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_local_capability_is_valid() {
        let capability = Capability::local(vec!["iTunes".into()]);
        assert!(capability.validate(MIN_CAPABILITY_VERSION).is_ok());
        assert!(capability.supports_protocol(ANNOUNCE_PROTOCOL, 1));
        assert!(capability.has_plugin("iTunes"));
        assert!(!capability.has_plugin("Spotify"));
        assert!(capability.user_agent.starts_with("Hydrabase/"));
    }

    #[test]
    fn test_wire_shape() {
        let capability = Capability::local(vec![]);
        let value = serde_json::to_value(&capability).unwrap();
        assert!(value.get("userAgent").is_some());
        assert_eq!(value["protocolVersions"]["1"], 1);
        assert_eq!(value["plugins"], json!([]));
    }

    #[test]
    fn test_accepts_legacy_hips_key() {
        let capability: Capability = serde_json::from_value(json!({
            "userAgent": "Hydrabase/0.0.1",
            "hips": { "1": 1, "2": 1 },
            "plugins": ["iTunes"]
        }))
        .unwrap();
        assert_eq!(capability.protocol_versions.get(&2), Some(&1));
    }

    #[test]
    fn test_missing_capability_protocol_rejected() {
        let mut capability = Capability::local(vec![]);
        capability.protocol_versions.remove(&CAPABILITY_PROTOCOL);
        assert_eq!(
            capability.validate(MIN_CAPABILITY_VERSION),
            Err(RejectReason::MissingCapabilityProtocol)
        );
    }

    #[test]
    fn test_version_too_low_rejected() {
        let capability = Capability::local(vec![]);
        assert_eq!(
            capability.validate(2),
            Err(RejectReason::VersionTooLow {
                advertised: 1,
                required: 2
            })
        );
    }
}
