//! Client for the burn-transaction service.
//!
//! The service decides which token accounts to close and builds the
//! transactions; we only send wallet addresses and a token list and get back
//! one bundle of unsigned, base64-encoded transactions per wallet.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VacuumError};

/// Build close transactions for an explicit list of token mints.
pub const BURN_ENDPOINT: &str = "/api/getBurnTransaction";

/// Build close transactions for every dust account except a keep-list.
pub const BURN_ALL_ENDPOINT: &str = "/api/getBurnAllTransaction";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-SDV-KEY";

/// Request body shared by both endpoints.
///
/// For `BURN_ALL_ENDPOINT`, `tokens` is the keep-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnRequest {
    pub wallets: Vec<String>,
    pub tokens: Vec<String>,
    /// Fee receiver override; omitted from the body when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
}

/// One wallet's transactions, in the order they should be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBundle {
    #[serde(rename = "wallets")]
    pub wallet: String,
    #[serde(default)]
    pub transactions: Vec<String>,
}

#[async_trait]
pub trait BurnService: Send + Sync {
    async fn burn_transactions(&self, request: &BurnRequest) -> Result<Vec<TransactionBundle>>;

    async fn burn_all_transactions(&self, request: &BurnRequest)
        -> Result<Vec<TransactionBundle>>;
}

/// `BurnService` over HTTPS. One POST per call, no retries.
pub struct HttpBurnService {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpBurnService {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    async fn post(
        &self,
        endpoint: &'static str,
        request: &BurnRequest,
    ) -> Result<Vec<TransactionBundle>> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), endpoint);
        let remote_error = |source| VacuumError::RemoteService {
            endpoint: endpoint.to_string(),
            source,
        };

        tracing::debug!(
            endpoint,
            wallets = request.wallets.len(),
            tokens = request.tokens.len(),
            "requesting burn transactions"
        );

        let bundles: Vec<TransactionBundle> = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(remote_error)?
            .json()
            .await
            .map_err(remote_error)?;

        tracing::debug!(endpoint, bundles = bundles.len(), "burn service responded");
        Ok(bundles)
    }
}

#[async_trait]
impl BurnService for HttpBurnService {
    async fn burn_transactions(&self, request: &BurnRequest) -> Result<Vec<TransactionBundle>> {
        self.post(BURN_ENDPOINT, request).await
    }

    async fn burn_all_transactions(
        &self,
        request: &BurnRequest,
    ) -> Result<Vec<TransactionBundle>> {
        self.post(BURN_ALL_ENDPOINT, request).await
    }
}
