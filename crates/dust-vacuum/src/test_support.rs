//! Fixtures shared by the unit tests: a one-shot HTTP server, unsigned
//! close transactions, and recording fakes for the service and RPC traits.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chain_sol::{
    CompiledInstruction, Keypair, Message, MessageHeader, MessageVersion, VersionedTransaction,
    EMPTY_SIGNATURE,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::error::{Result, VacuumError};
use crate::rpc::{RpcConnector, SendConfig, SimulateConfig, SimulationReport, SolanaRpc};
use crate::service::{BurnRequest, BurnService, TransactionBundle, BURN_ALL_ENDPOINT, BURN_ENDPOINT};

// ─── HTTP ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Accept one HTTP request on a local port, answer with `status` and
/// `body`, and hand the request back through the join handle.
pub async fn serve_once(status: u16, body: &str) -> (String, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = body.to_string();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before request head");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let mut lines = head.split("\r\n");
        let mut request_line = lines.next().unwrap_or_default().split(' ');
        let method = request_line.next().unwrap_or_default().to_string();
        let path = request_line.next().unwrap_or_default().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        let content_length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse::<usize>().ok())
            .unwrap_or(0);

        let body_start = head_end + 4;
        while buf.len() < body_start + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before request body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let request_body =
            String::from_utf8_lossy(&buf[body_start..body_start + content_length]).to_string();

        let reason = if status < 300 { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;

        CapturedRequest {
            method,
            path,
            headers,
            body: request_body,
        }
    });

    (format!("http://{addr}"), handle)
}

// ─── Transactions ──────────────────────────────────────────────────────

/// An unsigned close-account transaction with `owner` as the only signer.
pub fn unsigned_close_transaction(owner: &Keypair) -> VersionedTransaction {
    VersionedTransaction {
        signatures: vec![EMPTY_SIGNATURE],
        message: Message {
            version: MessageVersion::V0,
            header: MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed: 0,
                num_readonly_unsigned: 1,
            },
            account_keys: vec![owner.pubkey(), [0x11; 32], [0x06; 32]],
            recent_blockhash: [0xcc; 32],
            instructions: vec![CompiledInstruction {
                program_id_index: 2,
                account_indices: vec![1, 0, 0],
                data: vec![9],
            }],
            address_table_lookups: Vec::new(),
        },
    }
}

/// Base64 payload as the burn service would return it.
pub fn close_payload(owner: &Keypair) -> String {
    BASE64.encode(unsigned_close_transaction(owner).to_bytes().unwrap())
}

pub fn signed_close_transaction(owner: &Keypair) -> VersionedTransaction {
    let mut tx = unsigned_close_transaction(owner);
    tx.sign(owner).unwrap();
    tx
}

// ─── Fakes ─────────────────────────────────────────────────────────────

/// Records every request and answers with canned bundles.
#[derive(Default)]
pub struct SpyService {
    pub calls: Mutex<Vec<(&'static str, BurnRequest)>>,
    pub bundles: Vec<TransactionBundle>,
}

impl SpyService {
    pub fn answering(bundles: Vec<TransactionBundle>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            bundles,
        })
    }

    pub fn calls(&self) -> Vec<(&'static str, BurnRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BurnService for SpyService {
    async fn burn_transactions(&self, request: &BurnRequest) -> Result<Vec<TransactionBundle>> {
        self.calls.lock().unwrap().push((BURN_ENDPOINT, request.clone()));
        Ok(self.bundles.clone())
    }

    async fn burn_all_transactions(
        &self,
        request: &BurnRequest,
    ) -> Result<Vec<TransactionBundle>> {
        self.calls
            .lock()
            .unwrap()
            .push((BURN_ALL_ENDPOINT, request.clone()));
        Ok(self.bundles.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcCall {
    Send {
        fee_payer: String,
        signature: String,
        config: SendConfig,
    },
    Simulate {
        fee_payer: String,
        config: SimulateConfig,
    },
}

/// Fake RPC endpoint. Fails the call with index `fail_at` when set.
#[derive(Default)]
pub struct SpyRpc {
    pub calls: Arc<Mutex<Vec<RpcCall>>>,
    pub fail_at: Option<usize>,
}

impl SpyRpc {
    fn check_failure(&self) -> Result<()> {
        let index = self.calls.lock().unwrap().len();
        if self.fail_at == Some(index) {
            return Err(VacuumError::Rpc {
                code: Some(-32002),
                message: format!("call {index} rejected"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SolanaRpc for SpyRpc {
    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        config: &SendConfig,
    ) -> Result<String> {
        self.check_failure()?;
        let signature = transaction.signature().unwrap_or_default();
        self.calls.lock().unwrap().push(RpcCall::Send {
            fee_payer: transaction.message.fee_payer().unwrap_or_default(),
            signature: signature.clone(),
            config: *config,
        });
        Ok(signature)
    }

    async fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
        config: &SimulateConfig,
    ) -> Result<SimulationReport> {
        self.check_failure()?;
        self.calls.lock().unwrap().push(RpcCall::Simulate {
            fee_payer: transaction.message.fee_payer().unwrap_or_default(),
            config: *config,
        });
        Ok(SimulationReport {
            logs: Some(vec!["Program log: Instruction: CloseAccount".into()]),
            units_consumed: Some(2950),
            ..SimulationReport::default()
        })
    }
}

/// Hands out `SpyRpc`s that all log into one shared list.
#[derive(Default)]
pub struct SpyConnector {
    pub urls: Mutex<Vec<String>>,
    pub calls: Arc<Mutex<Vec<RpcCall>>>,
    pub fail_at: Option<usize>,
}

impl SpyConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_at(index: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_at: Some(index),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<RpcCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl RpcConnector for SpyConnector {
    fn connect(&self, url: &str) -> Box<dyn SolanaRpc> {
        self.urls.lock().unwrap().push(url.to_string());
        Box::new(SpyRpc {
            calls: Arc::clone(&self.calls),
            fail_at: self.fail_at,
        })
    }
}
