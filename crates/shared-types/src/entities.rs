//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Identity**: `Address`
//! - **Networking**: `Hostname`
//! - **Queries**: `RequestKind`

use crate::errors::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// IDENTITY
// =============================================================================

/// Length of an address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// A 20-byte account address derived from a secp256k1 public key.
///
/// Rendered as `0x` followed by 40 lowercase hex digits. Parsing accepts
/// mixed case and normalizes it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Wrap raw address bytes.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| TypeError::InvalidAddress(s.to_string()))?;
        if digits.len() != ADDRESS_LEN * 2 {
            return Err(TypeError::InvalidAddress(s.to_string()));
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| TypeError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// NETWORKING
// =============================================================================

/// Transport scheme every dial-able hostname carries.
pub const WS_SCHEME: &str = "ws://";

/// A dial-able peer locator of the form `ws://host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hostname(String);

impl Hostname {
    /// Validate and wrap a hostname. A trailing slash is dropped.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TypeError> {
        let raw = raw.into();
        let trimmed = raw.trim_end_matches('/');
        let authority = trimmed
            .strip_prefix(WS_SCHEME)
            .ok_or_else(|| TypeError::InvalidHostname(raw.clone()))?;
        if authority.is_empty() || authority.contains(char::is_whitespace) {
            return Err(TypeError::InvalidHostname(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Build a hostname from a host and port pair.
    pub fn from_host_port(host: &str, port: u16) -> Result<Self, TypeError> {
        Self::parse(format!("{WS_SCHEME}{host}:{port}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `host:port` part without the scheme.
    pub fn authority(&self) -> &str {
        &self.0[WS_SCHEME.len()..]
    }

    /// Out-of-band identity endpoint served next to the WebSocket listener.
    pub fn auth_url(&self) -> String {
        format!("http://{}/auth", self.authority())
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Hostname {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Hostname {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Hostname> for String {
    fn from(value: Hostname) -> Self {
        value.0
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// The three searchable record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Track,
    Artist,
    Album,
}

impl RequestKind {
    pub const ALL: [RequestKind; 3] = [RequestKind::Track, RequestKind::Artist, RequestKind::Album];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Track => "track",
            RequestKind::Artist => "artist",
            RequestKind::Album => "album",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(RequestKind::Track),
            "artist" => Ok(RequestKind::Artist),
            "album" => Ok(RequestKind::Album),
            other => Err(TypeError::UnknownKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrips_through_lowercase_hex() {
        let address: Address = "0xAbCdEf0123456789abcdef0123456789ABCDEF01".parse().unwrap();
        assert_eq!(address.to_string(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert!("abcdef0123456789abcdef0123456789abcdef01".parse::<Address>().is_err());
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzzcdef0123456789abcdef0123456789abcdef01".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_serializes_as_string() {
        let address = Address::from_bytes([0x11; ADDRESS_LEN]);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "11".repeat(20)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }

    #[test]
    fn test_hostname_requires_ws_scheme() {
        assert!(Hostname::parse("ws://10.0.0.1:3000").is_ok());
        assert!(Hostname::parse("http://10.0.0.1:3000").is_err());
        assert!(Hostname::parse("ws://").is_err());
        assert!(Hostname::parse("ws://bad host:1").is_err());
    }

    #[test]
    fn test_hostname_auth_url() {
        let hostname = Hostname::parse("ws://peer.example:4545/").unwrap();
        assert_eq!(hostname.as_str(), "ws://peer.example:4545");
        assert_eq!(hostname.authority(), "peer.example:4545");
        assert_eq!(hostname.auth_url(), "http://peer.example:4545/auth");
    }

    #[test]
    fn test_hostname_deserialize_validates() {
        assert!(serde_json::from_str::<Hostname>("\"ws://a:1\"").is_ok());
        assert!(serde_json::from_str::<Hostname>("\"https://a:1\"").is_err());
    }

    #[test]
    fn test_request_kind_wire_names() {
        assert_eq!(serde_json::to_string(&RequestKind::Album).unwrap(), "\"album\"");
        assert_eq!("artist".parse::<RequestKind>().unwrap(), RequestKind::Artist);
        assert!("song".parse::<RequestKind>().is_err());
    }
}
