//! Client configuration.
//!
//! A `VacuumConfig` is captured when the client is built and never changes
//! afterwards. Everything except the API key has a default matching the
//! public service and Solana mainnet.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::rpc::Commitment;

/// Base URL of the burn-transaction service.
pub const DEFAULT_SERVICE_URL: &str = "https://soldustvacuum.app";

/// RPC endpoint used when an operation does not name one.
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Retry budget handed to `sendTransaction`.
pub const DEFAULT_MAX_RETRIES: usize = 5;

#[derive(Debug, Deserialize)]
pub struct VacuumConfig {
    /// Sent as `X-SDV-KEY` on every service request.
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: SecretString,

    #[serde(default = "default_service_url")]
    pub service_url: String,

    #[serde(default = "default_rpc_url")]
    pub default_rpc_url: String,

    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Preflight commitment for submission, commitment for simulation.
    #[serde(default)]
    pub commitment: Commitment,

    /// Return outcomes gathered before a failure inside
    /// `VacuumError::Partial` instead of dropping them.
    #[serde(default)]
    pub partial_results: bool,
}

impl VacuumConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            service_url: default_service_url(),
            default_rpc_url: default_rpc_url(),
            max_retries: DEFAULT_MAX_RETRIES,
            commitment: Commitment::default(),
            partial_results: false,
        }
    }

    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }

    pub fn with_default_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.default_rpc_url = url.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn with_partial_results(mut self, enabled: bool) -> Self {
        self.partial_results = enabled;
        self
    }

    /// True when no usable API key was supplied.
    pub fn api_key_missing(&self) -> bool {
        self.api_key.expose_secret().trim().is_empty()
    }
}

fn default_service_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

fn default_max_retries() -> usize {
    DEFAULT_MAX_RETRIES
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = VacuumConfig::new("key");
        assert_eq!(config.service_url, DEFAULT_SERVICE_URL);
        assert_eq!(config.default_rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.commitment, Commitment::Confirmed);
        assert!(!config.partial_results);
        assert!(!config.api_key_missing());
    }

    #[test]
    fn blank_api_key_is_missing() {
        assert!(VacuumConfig::new("").api_key_missing());
        assert!(VacuumConfig::new("   ").api_key_missing());
    }

    #[test]
    fn deserialize_fills_defaults() {
        let config: VacuumConfig = serde_json::from_str(r#"{"api_key": "abc"}"#).unwrap();
        assert_eq!(config.api_key.expose_secret(), "abc");
        assert_eq!(config.service_url, DEFAULT_SERVICE_URL);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn deserialize_overrides() {
        let config: VacuumConfig = serde_json::from_str(
            r#"{
                "api_key": "abc",
                "service_url": "http://localhost:8080",
                "default_rpc_url": "https://api.devnet.solana.com",
                "max_retries": 2,
                "commitment": "finalized",
                "partial_results": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.service_url, "http://localhost:8080");
        assert_eq!(config.default_rpc_url, "https://api.devnet.solana.com");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.commitment, Commitment::Finalized);
        assert!(config.partial_results);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = VacuumConfig::new("super-secret-key");
        assert!(!format!("{config:?}").contains("super-secret-key"));
    }
}
