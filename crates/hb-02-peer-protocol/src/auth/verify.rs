//! Verification of a counterpart's address proofs.
//!
//! Acceptor order of checks:
//! 1. Credentials present, otherwise 400.
//! 2. API key, when sent, must match, otherwise 401.
//! 3. Header signature over `"I am connecting to <own hostname>"` must
//!    recover the claimed address, otherwise 403.
//! 4. The claimed hostname's `/auth` proof must be valid for the same
//!    address, otherwise 401.
//!
//! An API-key-only caller skips 3 and 4 and is served anonymously.

use super::proof::{dial_message, server_message, AuthProof, UpgradeHeaders};
use super::RemoteIdentity;
use crate::domain::errors::AuthError;
use crate::ports::outbound::AuthEndpointClient;
use hb_01_identity::{verify, Signature};
use shared_types::{Address, Hostname};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use uuid::Uuid;

/// What the accepting node knows about itself.
#[derive(Debug, Clone, Copy)]
pub struct AcceptorContext<'a> {
    pub own_hostname: &'a Hostname,
    pub own_address: Address,
    pub api_key: Option<&'a str>,
}

/// Check a `/auth` proof fetched from `hostname`.
pub fn verify_server_proof(proof: &AuthProof, hostname: &Hostname) -> Result<Address, AuthError> {
    if verify(&server_message(hostname), &proof.signature, &proof.address) {
        Ok(proof.address)
    } else {
        warn!(hostname = %hostname, "Invalid authentication from server");
        Err(AuthError::InvalidProof(hostname.to_string()))
    }
}

/// Dial side: learn and verify the address of `target` before connecting.
pub async fn authenticate_target(
    target: &Hostname,
    own_address: &Address,
    client: &dyn AuthEndpointClient,
) -> Result<Address, AuthError> {
    let proof = client.fetch_proof(target).await?;
    let address = verify_server_proof(&proof, target)?;
    if &address == own_address {
        return Err(AuthError::SelfConnection);
    }
    debug!(hostname = %target, peer = %address, "Verified server address");
    Ok(address)
}

/// Accept side: authenticate an upgrade request.
pub async fn authenticate_upgrade(
    headers: &UpgradeHeaders,
    ctx: AcceptorContext<'_>,
    client: &dyn AuthEndpointClient,
) -> Result<RemoteIdentity, AuthError> {
    if headers.api_key.is_none() && headers.signature.is_none() {
        return Err(AuthError::MissingCredentials);
    }

    if let Some(presented) = headers.api_key.as_deref() {
        let valid = ctx
            .api_key
            .is_some_and(|expected| constant_time_compare(presented, expected));
        if !valid {
            return Err(AuthError::InvalidApiKey);
        }
    }

    let Some(raw_signature) = headers.signature.as_deref() else {
        let id = Uuid::new_v4();
        debug!(client = %id, "Accepted API key client");
        return Ok(RemoteIdentity::ApiClient { id });
    };

    let raw_address = headers
        .address
        .as_deref()
        .ok_or(AuthError::MissingHeader("x-address"))?;
    let address: Address = raw_address.parse().map_err(|e: shared_types::TypeError| {
        AuthError::Malformed {
            field: "x-address",
            reason: e.to_string(),
        }
    })?;
    let signature: Signature = raw_signature.parse().map_err(|e: hb_01_identity::IdentityError| {
        AuthError::Malformed {
            field: "x-signature",
            reason: e.to_string(),
        }
    })?;

    if !verify(&dial_message(ctx.own_hostname), &signature, &address) {
        warn!(peer = %address, "Upgrade signature does not match our hostname");
        return Err(AuthError::InvalidSignature);
    }

    let raw_hostname = headers
        .hostname
        .as_deref()
        .ok_or(AuthError::MissingHeader("x-hostname"))?;
    let hostname = Hostname::parse(raw_hostname).map_err(|e| AuthError::Malformed {
        field: "x-hostname",
        reason: e.to_string(),
    })?;

    let proof = client.fetch_proof(&hostname).await?;
    let proven = verify_server_proof(&proof, &hostname)?;
    if proven != address {
        warn!(
            peer = %address,
            proven = %proven,
            hostname = %hostname,
            "Hostname proves a different address"
        );
        return Err(AuthError::InvalidProof(hostname.to_string()));
    }

    if address == ctx.own_address {
        return Err(AuthError::SelfConnection);
    }

    debug!(peer = %address, hostname = %hostname, "Authenticated upgrade");
    Ok(RemoteIdentity::Peer { address, hostname })
}

/// Constant-time string comparison. Differing lengths never match.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    let max_len = a.len().max(b.len());
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());
    let same_len = (a.len() as u64).ct_eq(&(b.len() as u64));
    bool::from(a_padded.ct_eq(&b_padded) & same_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::proof::server_proof;
    use async_trait::async_trait;
    use hb_01_identity::Identity;
    use std::collections::HashMap;

    /// Serves canned `/auth` proofs keyed by hostname.
    #[derive(Default)]
    struct StaticProofs(HashMap<Hostname, AuthProof>);

    #[async_trait]
    impl AuthEndpointClient for StaticProofs {
        async fn fetch_proof(&self, hostname: &Hostname) -> Result<AuthProof, AuthError> {
            self.0.get(hostname).cloned().ok_or_else(|| AuthError::Unreachable {
                endpoint: hostname.auth_url(),
                reason: "connection refused".to_string(),
            })
        }
    }

    struct Scenario {
        acceptor: Identity,
        acceptor_host: Hostname,
        dialer: Identity,
        dialer_host: Hostname,
        proofs: StaticProofs,
    }

    impl Scenario {
        fn new() -> Self {
            let dialer = Identity::generate();
            let dialer_host = Hostname::parse("ws://10.0.0.1:3000").unwrap();
            let mut proofs = StaticProofs::default();
            proofs
                .0
                .insert(dialer_host.clone(), server_proof(&dialer, &dialer_host).unwrap());
            Self {
                acceptor: Identity::generate(),
                acceptor_host: Hostname::parse("ws://10.0.0.2:3000").unwrap(),
                dialer,
                dialer_host,
                proofs,
            }
        }

        fn ctx(&self, api_key: Option<&'static str>) -> AcceptorContext<'_> {
            AcceptorContext {
                own_hostname: &self.acceptor_host,
                own_address: self.acceptor.address(),
                api_key,
            }
        }

        fn dial_headers(&self) -> UpgradeHeaders {
            UpgradeHeaders::for_dial(&self.dialer, &self.acceptor_host, &self.dialer_host, None)
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_valid_upgrade_binds_address_and_hostname() {
        let s = Scenario::new();
        let remote = authenticate_upgrade(&s.dial_headers(), s.ctx(None), &s.proofs)
            .await
            .unwrap();
        assert_eq!(
            remote,
            RemoteIdentity::Peer {
                address: s.dialer.address(),
                hostname: s.dialer_host.clone()
            }
        );
    }

    #[tokio::test]
    async fn test_signature_for_wrong_target_is_forbidden() {
        let s = Scenario::new();
        let elsewhere = Hostname::parse("ws://10.0.0.9:3000").unwrap();
        let headers = UpgradeHeaders::for_dial(&s.dialer, &elsewhere, &s.dialer_host, None).unwrap();
        let err = authenticate_upgrade(&headers, s.ctx(None), &s.proofs)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidSignature);
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_claimed_address_flip_is_forbidden() {
        let s = Scenario::new();
        let mut headers = s.dial_headers();
        headers.address = Some(Identity::generate().address().to_string());
        let err = authenticate_upgrade(&headers, s.ctx(None), &s.proofs)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidSignature);
    }

    #[tokio::test]
    async fn test_counterpart_proof_for_other_address_is_unauthorized() {
        let mut s = Scenario::new();
        let impostor = Identity::generate();
        s.proofs
            .0
            .insert(s.dialer_host.clone(), server_proof(&impostor, &s.dialer_host).unwrap());
        let err = authenticate_upgrade(&s.dial_headers(), s.ctx(None), &s.proofs)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidProof(_)));
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn test_unreachable_counterpart_is_unauthorized() {
        let mut s = Scenario::new();
        s.proofs.0.clear();
        let err = authenticate_upgrade(&s.dial_headers(), s.ctx(None), &s.proofs)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn test_missing_headers_are_bad_requests() {
        let s = Scenario::new();
        let err = authenticate_upgrade(&UpgradeHeaders::default(), s.ctx(None), &s.proofs)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::MissingCredentials);

        let mut headers = s.dial_headers();
        headers.hostname = None;
        let err = authenticate_upgrade(&headers, s.ctx(None), &s.proofs)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::MissingHeader("x-hostname"));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_api_key_modes() {
        let s = Scenario::new();
        let anonymous = authenticate_upgrade(&UpgradeHeaders::api_client("secret"), s.ctx(Some("secret")), &s.proofs)
            .await
            .unwrap();
        assert!(matches!(anonymous, RemoteIdentity::ApiClient { .. }));

        let err = authenticate_upgrade(&UpgradeHeaders::api_client("guess"), s.ctx(Some("secret")), &s.proofs)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidApiKey);

        let err = authenticate_upgrade(&UpgradeHeaders::api_client("secret"), s.ctx(None), &s.proofs)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidApiKey);
    }

    #[tokio::test]
    async fn test_dialer_rejects_invalid_or_self_proof() {
        let s = Scenario::new();
        let address = authenticate_target(&s.dialer_host, &s.acceptor.address(), &s.proofs)
            .await
            .unwrap();
        assert_eq!(address, s.dialer.address());

        let err = authenticate_target(&s.dialer_host, &s.dialer.address(), &s.proofs)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::SelfConnection);

        let mut forged = s.proofs.0[&s.dialer_host].clone();
        forged.address = Identity::generate().address();
        assert!(verify_server_proof(&forged, &s.dialer_host).is_err());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("secret", "secret"));
        assert!(!constant_time_compare("secret", "secreT"));
        assert!(!constant_time_compare("secret", "secret2"));
        assert!(!constant_time_compare("", "x"));
        assert!(constant_time_compare("", ""));
    }
}
