//! Signing and dispatch of burn-service bundles.
//!
//! Bundles are handled in the order the service returned them and
//! transactions in the order listed, one at a time. The first failure stops
//! the run.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chain_sol::{Keypair, VersionedTransaction};

use crate::error::{Result, VacuumError};
use crate::rpc::{SendConfig, SimulateConfig, SimulationReport, SolanaRpc};
use crate::service::TransactionBundle;
use crate::wallet::WalletSet;

/// Which keypair signs a bundle.
#[derive(Debug, Clone, Copy)]
pub enum Signers<'a> {
    /// Every bundle is signed by this keypair.
    Fixed(&'a Keypair),
    /// Each bundle is signed by the keypair matching its wallet address.
    ByAddress(&'a WalletSet),
}

impl<'a> Signers<'a> {
    fn resolve(&self, wallet: &str) -> Result<&'a Keypair> {
        match *self {
            Signers::Fixed(keypair) => Ok(keypair),
            Signers::ByAddress(set) => set
                .get(wallet)
                .ok_or_else(|| VacuumError::UnknownBundleWallet(wallet.to_string())),
        }
    }

    /// Wallet addresses to request transactions for.
    pub fn addresses(&self) -> Vec<String> {
        match self {
            Signers::Fixed(keypair) => vec![keypair.address().to_string()],
            Signers::ByAddress(set) => set.addresses(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Submit(SendConfig),
    Simulate(SimulateConfig),
}

/// Result of dispatching one transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Submitted(String),
    Simulated(SimulationReport),
}

impl Outcome {
    pub fn into_signature(self) -> Option<String> {
        match self {
            Outcome::Submitted(signature) => Some(signature),
            Outcome::Simulated(_) => None,
        }
    }

    pub fn into_report(self) -> Option<SimulationReport> {
        match self {
            Outcome::Simulated(report) => Some(report),
            Outcome::Submitted(_) => None,
        }
    }
}

/// Decode a base64 payload from the burn service.
pub fn decode_transaction(payload: &str) -> Result<VersionedTransaction> {
    let raw = BASE64
        .decode(payload.trim())
        .map_err(|e| VacuumError::MalformedTransaction(format!("invalid base64: {e}")))?;
    Ok(VersionedTransaction::from_bytes(&raw)?)
}

/// Sign and dispatch every transaction in `bundles`.
///
/// With `partial_results` set, a failure is returned as
/// [`VacuumError::Partial`] holding the outcomes gathered before it.
pub async fn process_bundles(
    bundles: &[TransactionBundle],
    signers: Signers<'_>,
    rpc: &dyn SolanaRpc,
    mode: DispatchMode,
    partial_results: bool,
) -> Result<Vec<Outcome>> {
    let mut outcomes = Vec::new();

    match dispatch_all(bundles, signers, rpc, mode, &mut outcomes).await {
        Ok(()) => Ok(outcomes),
        Err(source) if partial_results => Err(VacuumError::Partial {
            completed: outcomes,
            source: Box::new(source),
        }),
        Err(source) => Err(source),
    }
}

async fn dispatch_all(
    bundles: &[TransactionBundle],
    signers: Signers<'_>,
    rpc: &dyn SolanaRpc,
    mode: DispatchMode,
    outcomes: &mut Vec<Outcome>,
) -> Result<()> {
    for bundle in bundles {
        let signer = signers.resolve(&bundle.wallet)?;

        for (position, payload) in bundle.transactions.iter().enumerate() {
            let mut transaction = decode_transaction(payload)?;
            transaction.sign(signer)?;

            tracing::debug!(
                wallet = %bundle.wallet,
                position,
                version = ?transaction.message.version,
                "signed transaction"
            );

            let outcome = match mode {
                DispatchMode::Submit(config) => {
                    let signature = rpc.send_transaction(&transaction, &config).await?;
                    tracing::info!(wallet = %bundle.wallet, %signature, "submitted transaction");
                    Outcome::Submitted(signature)
                }
                DispatchMode::Simulate(config) => {
                    let report = rpc.simulate_transaction(&transaction, &config).await?;
                    tracing::info!(
                        wallet = %bundle.wallet,
                        succeeded = report.succeeded(),
                        "simulated transaction"
                    );
                    Outcome::Simulated(report)
                }
            };
            outcomes.push(outcome);
        }
    }
    Ok(())
}
