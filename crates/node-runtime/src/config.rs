//! # Node Configuration
//!
//! Runtime parameters of a node, read from `HB_*` environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `HB_SERVER_PORT` | `3000` |
//! | `HB_LISTEN_ADDRESS` | `0.0.0.0` |
//! | `HB_HOSTNAME` | `ws://127.0.0.1:<port>` |
//! | `HB_DHT_ROOM` | `hydrabase` |
//! | `HB_BOOTSTRAP_PEERS` | none, comma separated `ws://` hostnames |
//! | `HB_API_KEY` | none |
//! | `HB_PRIVATE_KEY` | none, a random identity is generated |
//! | `HB_AGREEMENT_SCORE` | `ratio` |
//! | `HB_FINAL_CONFIDENCE` | `product` |
//! | `HB_REQUEST_TIMEOUT_MS` | `15000` |
//! | `HB_HANDSHAKE_TIMEOUT_MS` | `10000` |
//! | `HB_CATALOG_PATH` | none, JSON catalog served as the `catalog` plugin |

use hb_02_peer_protocol::SessionConfig;
use hb_03_reconciliation::{AgreementFormula, ConfidenceCombiner, ReconcilerConfig, UnknownStrategy};
use shared_types::{Hostname, TypeError, WS_SCHEME};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DHT_ROOM: &str = "hydrabase";

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub listen_address: IpAddr,
    pub port: u16,
    /// Externally reachable `ws://host:port` of this node.
    pub hostname: Hostname,
    /// Rendezvous key under which the node is discoverable.
    pub dht_room: String,
    pub bootstrap_peers: Vec<Hostname>,
    /// Shared secret admitting anonymous API clients.
    pub api_key: Option<String>,
    /// Hex secret key. A fresh identity is generated when absent.
    pub private_key: Option<String>,
    pub agreement: AgreementFormula,
    pub combiner: ConfidenceCombiner,
    pub request_timeout: Duration,
    pub handshake_timeout: Duration,
    pub catalog_path: Option<PathBuf>,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var}: {source}")]
    InvalidHostname {
        var: &'static str,
        #[source]
        source: TypeError,
    },

    #[error("{var}: {source}")]
    UnknownStrategy {
        var: &'static str,
        #[source]
        source: UnknownStrategy,
    },

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

impl NodeConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let session = SessionConfig::default();

        let port = match get("HB_SERVER_PORT") {
            Some(raw) => parse_number("HB_SERVER_PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        let listen_address = match get("HB_LISTEN_ADDRESS") {
            Some(raw) => raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                var: "HB_LISTEN_ADDRESS",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let hostname = match get("HB_HOSTNAME") {
            Some(raw) => parse_hostname("HB_HOSTNAME", &raw)?,
            None => parse_hostname("HB_SERVER_PORT", &format!("{WS_SCHEME}127.0.0.1:{port}"))?,
        };

        let bootstrap_peers = match get("HB_BOOTSTRAP_PEERS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_hostname("HB_BOOTSTRAP_PEERS", s))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let agreement = match get("HB_AGREEMENT_SCORE") {
            Some(raw) => raw.parse().map_err(|source| ConfigError::UnknownStrategy {
                var: "HB_AGREEMENT_SCORE",
                source,
            })?,
            None => AgreementFormula::default(),
        };

        let combiner = match get("HB_FINAL_CONFIDENCE") {
            Some(raw) => raw.parse().map_err(|source| ConfigError::UnknownStrategy {
                var: "HB_FINAL_CONFIDENCE",
                source,
            })?,
            None => ConfidenceCombiner::default(),
        };

        let request_timeout = match get("HB_REQUEST_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(parse_number("HB_REQUEST_TIMEOUT_MS", &raw)?),
            None => session.request_timeout,
        };

        let handshake_timeout = match get("HB_HANDSHAKE_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(parse_number("HB_HANDSHAKE_TIMEOUT_MS", &raw)?),
            None => session.handshake_timeout,
        };

        let config = Self {
            listen_address,
            port,
            hostname,
            dht_room: get("HB_DHT_ROOM").unwrap_or_else(|| DEFAULT_DHT_ROOM.to_string()),
            bootstrap_peers,
            api_key: get("HB_API_KEY"),
            private_key: get("HB_PRIVATE_KEY"),
            agreement,
            combiner,
            request_timeout,
            handshake_timeout,
            catalog_path: get("HB_CATALOG_PATH").map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("HB_REQUEST_TIMEOUT_MS"));
        }
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("HB_HANDSHAKE_TIMEOUT_MS"));
        }
        if self.dht_room.is_empty() {
            return Err(ConfigError::InvalidValue {
                var: "HB_DHT_ROOM",
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.port)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            request_timeout: self.request_timeout,
            handshake_timeout: self.handshake_timeout,
            ..SessionConfig::default()
        }
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            agreement: self.agreement,
            combiner: self.combiner.clone(),
        }
    }
}

fn parse_hostname(var: &'static str, raw: &str) -> Result<Hostname, ConfigError> {
    Hostname::parse(raw).map_err(|source| ConfigError::InvalidHostname { var, source })
}

fn parse_number<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
