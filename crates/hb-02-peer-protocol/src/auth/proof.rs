//! Address proofs produced by the local node.
//!
//! - The accepting side serves `{signature, address}` at `GET /auth`, signing
//!   `"I am <own hostname>"`.
//! - The dialing side attaches upgrade headers signing
//!   `"I am connecting to <target hostname>"`.

use crate::domain::errors::AuthError;
use axum::http::HeaderMap;
use hb_01_identity::{Identity, Signature};
use serde::{Deserialize, Serialize};
use shared_types::{Address, Hostname};

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const ADDRESS_HEADER: &str = "x-address";
pub const HOSTNAME_HEADER: &str = "x-hostname";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Body of the `/auth` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthProof {
    pub signature: Signature,
    pub address: Address,
}

/// Message a node signs to prove it is reachable at `hostname`.
pub fn server_message(hostname: &Hostname) -> String {
    format!("I am {hostname}")
}

/// Message a dialer signs to prove it intends to reach `target`.
pub fn dial_message(target: &Hostname) -> String {
    format!("I am connecting to {target}")
}

/// Build this node's `/auth` response.
pub fn server_proof(identity: &Identity, own_hostname: &Hostname) -> Result<AuthProof, AuthError> {
    let signature = identity
        .sign(&server_message(own_hostname))
        .map_err(|e| AuthError::Signing(e.to_string()))?;
    Ok(AuthProof {
        signature,
        address: identity.address(),
    })
}

/// Credentials carried on a WebSocket upgrade request.
///
/// Values are kept as raw strings; the acceptor parses them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeHeaders {
    pub signature: Option<String>,
    pub address: Option<String>,
    pub hostname: Option<String>,
    pub api_key: Option<String>,
}

impl UpgradeHeaders {
    /// Headers a dialer sends to `target`.
    pub fn for_dial(
        identity: &Identity,
        target: &Hostname,
        own_hostname: &Hostname,
        api_key: Option<&str>,
    ) -> Result<Self, AuthError> {
        let signature = identity
            .sign(&dial_message(target))
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        Ok(Self {
            signature: Some(signature.to_string()),
            address: Some(identity.address().to_string()),
            hostname: Some(own_hostname.to_string()),
            api_key: api_key.map(str::to_string),
        })
    }

    /// Headers of an anonymous API client.
    pub fn api_client(api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::default()
        }
    }

    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            signature: get(SIGNATURE_HEADER),
            address: get(ADDRESS_HEADER),
            hostname: get(HOSTNAME_HEADER),
            api_key: get(API_KEY_HEADER),
        }
    }

    /// Present headers as name/value pairs.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        [
            (SIGNATURE_HEADER, &self.signature),
            (ADDRESS_HEADER, &self.address),
            (HOSTNAME_HEADER, &self.hostname),
            (API_KEY_HEADER, &self.api_key),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_proof_serializes_with_string_fields() {
        let identity = Identity::generate();
        let hostname = Hostname::parse("ws://127.0.0.1:3000").unwrap();
        let proof = server_proof(&identity, &hostname).unwrap();
        let value = serde_json::to_value(&proof).unwrap();
        assert_eq!(value["address"], identity.address().to_string());
        assert!(value["signature"].as_str().unwrap().starts_with("0x"));
    }

    #[test]
    fn test_dial_headers_roundtrip_through_header_map() {
        let identity = Identity::generate();
        let target = Hostname::parse("ws://10.0.0.2:3000").unwrap();
        let own = Hostname::parse("ws://10.0.0.1:3000").unwrap();
        let headers = UpgradeHeaders::for_dial(&identity, &target, &own, None).unwrap();

        let mut map = HeaderMap::new();
        for (name, value) in headers.pairs() {
            map.insert(name, HeaderValue::from_str(value).unwrap());
        }
        assert_eq!(UpgradeHeaders::from_header_map(&map), headers);
        assert_eq!(headers.pairs().len(), 3);
    }
}
