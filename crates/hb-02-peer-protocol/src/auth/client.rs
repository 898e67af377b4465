//! HTTP adapter for fetching a counterpart's `/auth` proof.

use super::proof::AuthProof;
use crate::domain::errors::AuthError;
use crate::ports::outbound::AuthEndpointClient;
use async_trait::async_trait;
use shared_types::Hostname;
use std::time::Duration;
use tracing::debug;

/// Default timeout for a proof fetch.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Fetches proofs over plain HTTP from `http://<host:port>/auth`.
#[derive(Debug, Clone)]
pub struct HttpAuthClient {
    client: reqwest::Client,
}

impl HttpAuthClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpAuthClient {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_TIMEOUT)
    }
}

#[async_trait]
impl AuthEndpointClient for HttpAuthClient {
    async fn fetch_proof(&self, hostname: &Hostname) -> Result<AuthProof, AuthError> {
        let endpoint = hostname.auth_url();
        debug!(endpoint = %endpoint, "Fetching address proof");

        let unreachable = |reason: String| AuthError::Unreachable {
            endpoint: endpoint.clone(),
            reason,
        };

        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unreachable(format!("status {}", response.status())));
        }
        response
            .json::<AuthProof>()
            .await
            .map_err(|_| AuthError::InvalidProof(hostname.to_string()))
    }
}
