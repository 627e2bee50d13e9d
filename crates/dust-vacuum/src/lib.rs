//! Close Solana dust token accounts through the burn-transaction service.
//!
//! [`DustVacuum`] asks the service for pre-built close transactions, signs
//! them locally with the caller's keypairs and submits (or simulates) them
//! against a Solana RPC endpoint, one at a time and in the order returned.

pub mod config;
pub mod error;
pub mod processor;
pub mod rpc;
pub mod service;
pub mod wallet;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

pub use chain_sol::Keypair;
pub use config::{VacuumConfig, DEFAULT_MAX_RETRIES, DEFAULT_RPC_URL, DEFAULT_SERVICE_URL};
pub use error::{Result, VacuumError};
pub use processor::{DispatchMode, Outcome, Signers};
pub use rpc::{
    Commitment, HttpRpcClient, HttpRpcConnector, RpcConnector, SendConfig, SimulateConfig,
    SimulationReport, SolanaRpc,
};
pub use service::{BurnRequest, BurnService, HttpBurnService, TransactionBundle};
pub use wallet::{WalletRef, WalletSet};

// ─── Options ─────────────────────────────────────────────────────────

/// Per-call overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseOptions {
    /// RPC endpoint for this call. Falls back to the configured default.
    pub rpc_url: Option<String>,
    /// Address that receives the service fee instead of the service default.
    /// Empty strings count as unset.
    pub fee_receiver: Option<String>,
}

impl CloseOptions {
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    pub fn with_fee_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.fee_receiver = Some(receiver.into());
        self
    }

    fn rpc_url(&self) -> Option<&str> {
        self.rpc_url.as_deref().filter(|url| !url.is_empty())
    }

    fn fee_receiver(&self) -> Option<&str> {
        self.fee_receiver.as_deref().filter(|r| !r.is_empty())
    }
}

#[derive(Debug, Clone, Copy)]
enum Selection {
    /// Close accounts for the listed mints.
    Tokens,
    /// Close every dust account except the listed mints.
    AllExcept,
}

// ─── Client ──────────────────────────────────────────────────────────

pub struct DustVacuum {
    config: VacuumConfig,
    service: Arc<dyn BurnService>,
    connector: Arc<dyn RpcConnector>,
}

impl DustVacuum {
    /// Client for the public service with default settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_config(VacuumConfig::new(api_key))
    }

    pub fn with_config(config: VacuumConfig) -> Self {
        let service = Arc::new(HttpBurnService::new(
            config.service_url.clone(),
            config.api_key.clone(),
        ));
        Self::with_backends(config, service, Arc::new(HttpRpcConnector::new()))
    }

    /// Client over caller-supplied service and RPC backends.
    pub fn with_backends(
        config: VacuumConfig,
        service: Arc<dyn BurnService>,
        connector: Arc<dyn RpcConnector>,
    ) -> Self {
        Self {
            config,
            service,
            connector,
        }
    }

    pub fn config(&self) -> &VacuumConfig {
        &self.config
    }

    // ─── Explicit token list ─────────────────────────────────────────

    /// Close `tokens` accounts owned by one wallet. Returns the submitted
    /// signatures in order.
    pub async fn close_accounts(
        &self,
        wallet: &WalletRef,
        tokens: &[String],
        options: &CloseOptions,
    ) -> Result<Vec<String>> {
        self.check_arguments(wallet, Some(tokens), options)?;
        let keypair = wallet::load_single(wallet).await?;
        let outcomes = self
            .run(Signers::Fixed(&keypair), Selection::Tokens, tokens, options, self.submit_mode())
            .await?;
        Ok(signatures(outcomes))
    }

    /// Close `tokens` accounts for a collection of wallets.
    pub async fn close_accounts_batch(
        &self,
        wallets: &WalletRef,
        tokens: &[String],
        options: &CloseOptions,
    ) -> Result<Vec<String>> {
        self.check_arguments(wallets, Some(tokens), options)?;
        let set = wallet::load_collection(wallets).await?;
        let outcomes = self
            .run(Signers::ByAddress(&set), Selection::Tokens, tokens, options, self.submit_mode())
            .await?;
        Ok(signatures(outcomes))
    }

    /// Close `tokens` accounts for every usable key file in a directory.
    pub async fn close_accounts_folder(
        &self,
        folder: &WalletRef,
        tokens: &[String],
        options: &CloseOptions,
    ) -> Result<Vec<String>> {
        self.check_arguments(folder, Some(tokens), options)?;
        let set = wallet::load_directory(folder).await?;
        let outcomes = self
            .run(Signers::ByAddress(&set), Selection::Tokens, tokens, options, self.submit_mode())
            .await?;
        Ok(signatures(outcomes))
    }

    /// Simulate closing `tokens` accounts for one wallet. Nothing is
    /// submitted.
    pub async fn close_accounts_simulate(
        &self,
        wallet: &WalletRef,
        tokens: &[String],
        options: &CloseOptions,
    ) -> Result<Vec<SimulationReport>> {
        self.check_arguments(wallet, Some(tokens), options)?;
        let keypair = wallet::load_single(wallet).await?;
        let mode = DispatchMode::Simulate(SimulateConfig {
            commitment: self.config.commitment,
        });
        let outcomes = self
            .run(Signers::Fixed(&keypair), Selection::Tokens, tokens, options, mode)
            .await?;
        Ok(outcomes.into_iter().filter_map(Outcome::into_report).collect())
    }

    // ─── Everything except a keep-list ───────────────────────────────

    /// Close every dust account of one wallet except the `keep` mints.
    pub async fn close_all_accounts(
        &self,
        wallet: &WalletRef,
        keep: Option<&[String]>,
        options: &CloseOptions,
    ) -> Result<Vec<String>> {
        self.check_arguments(wallet, None, options)?;
        let keypair = wallet::load_single(wallet).await?;
        let outcomes = self
            .run(
                Signers::Fixed(&keypair),
                Selection::AllExcept,
                keep.unwrap_or_default(),
                options,
                self.submit_mode(),
            )
            .await?;
        Ok(signatures(outcomes))
    }

    pub async fn close_all_accounts_batch(
        &self,
        wallets: &WalletRef,
        keep: Option<&[String]>,
        options: &CloseOptions,
    ) -> Result<Vec<String>> {
        self.check_arguments(wallets, None, options)?;
        let set = wallet::load_collection(wallets).await?;
        let outcomes = self
            .run(
                Signers::ByAddress(&set),
                Selection::AllExcept,
                keep.unwrap_or_default(),
                options,
                self.submit_mode(),
            )
            .await?;
        Ok(signatures(outcomes))
    }

    pub async fn close_all_accounts_folder(
        &self,
        folder: &WalletRef,
        keep: Option<&[String]>,
        options: &CloseOptions,
    ) -> Result<Vec<String>> {
        self.check_arguments(folder, None, options)?;
        let set = wallet::load_directory(folder).await?;
        let outcomes = self
            .run(
                Signers::ByAddress(&set),
                Selection::AllExcept,
                keep.unwrap_or_default(),
                options,
                self.submit_mode(),
            )
            .await?;
        Ok(signatures(outcomes))
    }

    // ─── Internals ───────────────────────────────────────────────────

    /// Argument checks shared by every operation. Runs before any file or
    /// network access.
    fn check_arguments(
        &self,
        wallet: &WalletRef,
        tokens: Option<&[String]>,
        options: &CloseOptions,
    ) -> Result<()> {
        if self.config.api_key_missing() {
            return Err(VacuumError::InvalidArgument(
                "an API key is required".into(),
            ));
        }
        if wallet.is_missing() {
            return Err(VacuumError::InvalidArgument("a wallet is required".into()));
        }
        if tokens.is_some_and(|tokens| tokens.is_empty()) {
            return Err(VacuumError::InvalidArgument(
                "the token list is empty; close all accounts with a keep-list instead".into(),
            ));
        }
        if let Some(receiver) = options.fee_receiver() {
            chain_sol::validate_address(receiver).map_err(|e| {
                VacuumError::InvalidArgument(format!("fee receiver {receiver}: {e}"))
            })?;
        }
        Ok(())
    }

    fn submit_mode(&self) -> DispatchMode {
        DispatchMode::Submit(SendConfig {
            max_retries: self.config.max_retries,
            preflight_commitment: self.config.commitment,
        })
    }

    async fn run(
        &self,
        signers: Signers<'_>,
        selection: Selection,
        tokens: &[String],
        options: &CloseOptions,
        mode: DispatchMode,
    ) -> Result<Vec<Outcome>> {
        let wallets = signers.addresses();
        if wallets.is_empty() {
            tracing::warn!("no usable wallets, nothing to close");
            return Ok(Vec::new());
        }

        tracing::info!(
            wallets = wallets.len(),
            tokens = tokens.len(),
            ?selection,
            ?mode,
            "closing token accounts"
        );

        let request = BurnRequest {
            wallets,
            tokens: tokens.to_vec(),
            receiver: options.fee_receiver().map(str::to_string),
        };
        let bundles = match selection {
            Selection::Tokens => self.service.burn_transactions(&request).await?,
            Selection::AllExcept => self.service.burn_all_transactions(&request).await?,
        };

        let rpc_url = options
            .rpc_url()
            .unwrap_or(self.config.default_rpc_url.as_str());
        let rpc = self.connector.connect(rpc_url);

        processor::process_bundles(
            &bundles,
            signers,
            rpc.as_ref(),
            mode,
            self.config.partial_results,
        )
        .await
    }
}

fn signatures(outcomes: Vec<Outcome>) -> Vec<String> {
    outcomes
        .into_iter()
        .filter_map(Outcome::into_signature)
        .collect()
}
