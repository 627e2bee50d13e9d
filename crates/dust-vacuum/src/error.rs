use std::path::PathBuf;

use thiserror::Error;

use crate::processor::Outcome;

#[derive(Debug, Error)]
pub enum VacuumError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid wallet: {0}")]
    InvalidWallet(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed key file {}: {reason}", path.display())]
    KeyFile { path: PathBuf, reason: String },

    #[error("Burn service request to {endpoint} failed: {source}")]
    RemoteService {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("Burn service returned a bundle for unknown wallet {0}")]
    UnknownBundleWallet(String),

    #[error("RPC error{}: {message}", .code.map(|c| format!(" {c}")).unwrap_or_default())]
    Rpc { code: Option<i64>, message: String },

    #[error("{source} ({} transactions completed before the failure)", .completed.len())]
    Partial {
        completed: Vec<Outcome>,
        #[source]
        source: Box<VacuumError>,
    },
}

pub type Result<T> = std::result::Result<T, VacuumError>;

impl VacuumError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VacuumError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn key_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        VacuumError::KeyFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<chain_sol::SolError> for VacuumError {
    fn from(e: chain_sol::SolError) -> Self {
        match e {
            chain_sol::SolError::InvalidPrivateKey(_) | chain_sol::SolError::InvalidPublicKey(_) => {
                VacuumError::InvalidWallet(e.to_string())
            }
            _ => VacuumError::MalformedTransaction(e.to_string()),
        }
    }
}
