//! # Address Authentication
//!
//! Mutual proof of address before any application traffic. Both sides prove
//! control of their key by signing messages bound to the counterpart's
//! hostname, and each side can independently fetch the other's `/auth` proof.

mod client;
mod proof;
mod verify;

pub use client::{HttpAuthClient, DEFAULT_AUTH_TIMEOUT};
pub use proof::{
    dial_message, server_message, server_proof, AuthProof, UpgradeHeaders, ADDRESS_HEADER,
    API_KEY_HEADER, HOSTNAME_HEADER, SIGNATURE_HEADER,
};
pub use verify::{
    authenticate_target, authenticate_upgrade, constant_time_compare, verify_server_proof,
    AcceptorContext,
};

use shared_types::{Address, Hostname};
use std::fmt;
use uuid::Uuid;

/// Who is on the other end of an authenticated connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteIdentity {
    /// A node that proved its address and dial-able hostname.
    Peer { address: Address, hostname: Hostname },
    /// A client admitted by shared API key. Not individually addressed.
    ApiClient { id: Uuid },
}

impl RemoteIdentity {
    pub fn address(&self) -> Option<Address> {
        match self {
            Self::Peer { address, .. } => Some(*address),
            Self::ApiClient { .. } => None,
        }
    }

    pub fn hostname(&self) -> Option<&Hostname> {
        match self {
            Self::Peer { hostname, .. } => Some(hostname),
            Self::ApiClient { .. } => None,
        }
    }

    pub fn is_peer(&self) -> bool {
        matches!(self, Self::Peer { .. })
    }
}

impl fmt::Display for RemoteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Peer { address, hostname } => write!(f, "{address}@{hostname}"),
            Self::ApiClient { id } => write!(f, "api-client/{id}"),
        }
    }
}
