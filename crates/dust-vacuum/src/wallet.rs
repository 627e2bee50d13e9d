//! Wallet loading.
//!
//! Callers name their wallets with a [`WalletRef`]: a keypair they already
//! hold, a key file, a list of either, or a directory of key files. Key files
//! use the `solana-keygen` layout, a JSON array of 64 byte values.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chain_sol::{Keypair, KEYPAIR_LENGTH};
use serde_json::error::Category;
use zeroize::Zeroizing;

use crate::error::{Result, VacuumError};

/// File-name suffix of key files picked up from a wallet directory.
pub const KEY_FILE_SUFFIX: &str = ".json";

#[derive(Debug, Clone)]
pub enum WalletRef {
    InlineKey(Keypair),
    FilePath(PathBuf),
    Collection(Vec<WalletRef>),
    DirectoryPath(PathBuf),
}

impl WalletRef {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        WalletRef::FilePath(path.into())
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        WalletRef::DirectoryPath(path.into())
    }

    pub fn collection<I, W>(wallets: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Into<WalletRef>,
    {
        WalletRef::Collection(wallets.into_iter().map(Into::into).collect())
    }

    /// An empty path or an empty collection names no wallet at all. A
    /// collection holding such an entry counts as missing too.
    pub fn is_missing(&self) -> bool {
        match self {
            WalletRef::InlineKey(_) => false,
            WalletRef::FilePath(path) | WalletRef::DirectoryPath(path) => {
                path.as_os_str().is_empty()
            }
            WalletRef::Collection(items) => {
                items.is_empty() || items.iter().any(WalletRef::is_missing)
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            WalletRef::InlineKey(_) => "inline keypair",
            WalletRef::FilePath(_) => "key file path",
            WalletRef::Collection(_) => "wallet collection",
            WalletRef::DirectoryPath(_) => "wallet directory",
        }
    }
}

impl From<Keypair> for WalletRef {
    fn from(keypair: Keypair) -> Self {
        WalletRef::InlineKey(keypair)
    }
}

impl From<PathBuf> for WalletRef {
    fn from(path: PathBuf) -> Self {
        WalletRef::FilePath(path)
    }
}

impl From<&Path> for WalletRef {
    fn from(path: &Path) -> Self {
        WalletRef::FilePath(path.to_path_buf())
    }
}

/// Loaded wallets indexed by address.
///
/// Addresses keep the position of their first insertion; inserting an
/// address again replaces its keypair in place.
#[derive(Debug, Clone, Default)]
pub struct WalletSet {
    wallets: Vec<Keypair>,
    index: HashMap<String, usize>,
}

impl WalletSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, keypair: Keypair) {
        let existing = self.index.get(keypair.address()).copied();
        match existing {
            Some(pos) => self.wallets[pos] = keypair,
            None => {
                self.index
                    .insert(keypair.address().to_string(), self.wallets.len());
                self.wallets.push(keypair);
            }
        }
    }

    pub fn get(&self, address: &str) -> Option<&Keypair> {
        self.index.get(address).map(|&pos| &self.wallets[pos])
    }

    pub fn addresses(&self) -> Vec<String> {
        self.wallets.iter().map(|k| k.address().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keypair> {
        self.wallets.iter()
    }
}

impl FromIterator<Keypair> for WalletSet {
    fn from_iter<I: IntoIterator<Item = Keypair>>(iter: I) -> Self {
        let mut set = WalletSet::new();
        for keypair in iter {
            set.insert(keypair);
        }
        set
    }
}

// ─── Loading ───────────────────────────────────────────────────────────

/// Resolve a single wallet: an inline keypair or one key file.
pub async fn load_single(wallet: &WalletRef) -> Result<Keypair> {
    match wallet {
        WalletRef::InlineKey(keypair) => Ok(keypair.clone()),
        WalletRef::FilePath(path) => read_key_file(path).await,
        other => Err(VacuumError::InvalidWallet(format!(
            "expected a keypair or key file, got a {}",
            other.kind()
        ))),
    }
}

/// Resolve a collection of inline keypairs and key files.
///
/// Any bad entry fails the whole load.
pub async fn load_collection(wallets: &WalletRef) -> Result<WalletSet> {
    let WalletRef::Collection(items) = wallets else {
        return Err(VacuumError::InvalidWallet(format!(
            "expected a wallet collection, got a {}",
            wallets.kind()
        )));
    };

    let mut set = WalletSet::new();
    for item in items {
        set.insert(load_single(item).await?);
    }
    Ok(set)
}

/// Load every usable key file in a directory.
///
/// Only regular files ending in [`KEY_FILE_SUFFIX`] are read, in file-name
/// order. Symlinks are followed; dangling links and links to anything other
/// than a regular file are skipped. Files that are not JSON, not an array of
/// exactly 64 byte values, or whose public half does not match the seed are
/// skipped with a warning. A regular file that cannot be read is still an
/// error.
pub async fn load_directory(wallets: &WalletRef) -> Result<WalletSet> {
    let WalletRef::DirectoryPath(dir) = wallets else {
        return Err(VacuumError::InvalidWallet(format!(
            "expected a wallet directory, got a {}",
            wallets.kind()
        )));
    };

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| VacuumError::io(dir, e))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| VacuumError::io(dir, e))?
    {
        let path = entry.path();
        let is_key_file = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(KEY_FILE_SUFFIX));
        if !is_key_file {
            continue;
        }
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable entry");
            }
        }
    }
    paths.sort();

    let mut set = WalletSet::new();
    for path in paths {
        match read_key_file(&path).await {
            Ok(keypair) => set.insert(keypair),
            Err(err @ (VacuumError::KeyFile { .. } | VacuumError::InvalidWallet(_))) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping invalid key file");
            }
            Err(err) => return Err(err),
        }
    }

    tracing::debug!(dir = %dir.display(), wallets = set.len(), "loaded wallet directory");
    Ok(set)
}

/// Read a `solana-keygen` key file.
pub async fn read_key_file(path: &Path) -> Result<Keypair> {
    let contents = Zeroizing::new(
        tokio::fs::read(path)
            .await
            .map_err(|e| VacuumError::io(path, e))?,
    );
    let bytes =
        parse_key_material(&contents).map_err(|reason| VacuumError::key_file(path, reason))?;
    Ok(Keypair::from_secret_key_bytes(&bytes)?)
}

fn parse_key_material(contents: &[u8]) -> std::result::Result<Zeroizing<Vec<u8>>, String> {
    let bytes: Zeroizing<Vec<u8>> = match serde_json::from_slice::<Vec<u8>>(contents) {
        Ok(bytes) => Zeroizing::new(bytes),
        Err(e) if e.classify() == Category::Data => {
            return Err(format!("expected a JSON array of byte values: {e}"))
        }
        Err(e) => return Err(format!("not valid JSON: {e}")),
    };

    if bytes.len() != KEYPAIR_LENGTH {
        return Err(format!(
            "expected {KEYPAIR_LENGTH} bytes, got {}",
            bytes.len()
        ));
    }
    Ok(bytes)
}
