//! Solana JSON-RPC collaborator.
//!
//! Only two methods are needed: `sendTransaction` and `simulateTransaction`.
//! Both take the signed transaction as base64 wire bytes. The traits exist
//! so the processor can be driven against a recording fake in tests.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chain_sol::VersionedTransaction;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, VacuumError};

/// Confirmation level used for preflight checks and simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// Options for `sendTransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendConfig {
    pub max_retries: usize,
    pub preflight_commitment: Commitment,
}

/// Options for `simulateTransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulateConfig {
    pub commitment: Commitment,
}

/// The `value` of a `simulateTransaction` response.
///
/// A failed simulation is still a successful call: the failure is reported
/// in `err` along with the program logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub logs: Option<Vec<String>>,
    #[serde(default)]
    pub accounts: Option<Value>,
    #[serde(default)]
    pub units_consumed: Option<u64>,
    #[serde(default)]
    pub return_data: Option<Value>,
}

impl SimulationReport {
    pub fn succeeded(&self) -> bool {
        self.err.is_none()
    }
}

#[async_trait]
pub trait SolanaRpc: Send + Sync {
    /// Submit a signed transaction, returning its signature.
    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        config: &SendConfig,
    ) -> Result<String>;

    /// Run a signed transaction without committing it.
    async fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
        config: &SimulateConfig,
    ) -> Result<SimulationReport>;
}

/// Opens an RPC client for an endpoint URL. Operations may each name their
/// own endpoint, so the facade connects per call.
pub trait RpcConnector: Send + Sync {
    fn connect(&self, url: &str) -> Box<dyn SolanaRpc>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Contextual<T> {
    value: T,
}

/// JSON-RPC 2.0 client over HTTP.
pub struct HttpRpcClient {
    client: Client,
    url: String,
}

impl HttpRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;

        // Nodes may pair a JSON-RPC error object with a non-2xx status.
        match serde_json::from_slice::<RpcResponse<T>>(&bytes) {
            Ok(RpcResponse {
                error: Some(error), ..
            }) => Err(VacuumError::Rpc {
                code: Some(error.code),
                message: error.message,
            }),
            _ if !status.is_success() => Err(VacuumError::Rpc {
                code: None,
                message: format!("{method} failed with HTTP status {status}"),
            }),
            Ok(RpcResponse {
                result: Some(result), ..
            }) => Ok(result),
            Ok(_) => Err(VacuumError::Rpc {
                code: None,
                message: format!("{method} response has neither result nor error"),
            }),
            Err(e) => Err(VacuumError::Rpc {
                code: None,
                message: format!("invalid {method} response: {e}"),
            }),
        }
    }
}

fn transport_error(e: reqwest::Error) -> VacuumError {
    VacuumError::Rpc {
        code: None,
        message: e.to_string(),
    }
}

fn encode_transaction(transaction: &VersionedTransaction) -> Result<String> {
    Ok(BASE64.encode(transaction.to_bytes()?))
}

#[async_trait]
impl SolanaRpc for HttpRpcClient {
    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        config: &SendConfig,
    ) -> Result<String> {
        let params = json!([
            encode_transaction(transaction)?,
            {
                "encoding": "base64",
                "maxRetries": config.max_retries,
                "preflightCommitment": config.preflight_commitment.as_str(),
            }
        ]);
        self.call("sendTransaction", params).await
    }

    async fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
        config: &SimulateConfig,
    ) -> Result<SimulationReport> {
        let params = json!([
            encode_transaction(transaction)?,
            {
                "encoding": "base64",
                "commitment": config.commitment.as_str(),
            }
        ]);
        let response: Contextual<SimulationReport> =
            self.call("simulateTransaction", params).await?;
        Ok(response.value)
    }
}

/// Connects `HttpRpcClient`s that share one connection pool.
#[derive(Default)]
pub struct HttpRpcConnector {
    client: Client,
}

impl HttpRpcConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RpcConnector for HttpRpcConnector {
    fn connect(&self, url: &str) -> Box<dyn SolanaRpc> {
        Box::new(HttpRpcClient::with_client(self.client.clone(), url))
    }
}
