//! Solana signing identities.
//!
//! Solana tooling stores a keypair as 64 bytes: the 32-byte Ed25519 seed
//! followed by the 32-byte public key. Key files written by `solana-keygen`
//! hold exactly that, as a JSON array of numbers.

use ed25519_dalek::{Signer, SigningKey};
use zeroize::Zeroize;

use crate::address::pubkey_to_address;
use crate::error::SolError;

/// Length of the secret-key material in a Solana keypair.
pub const KEYPAIR_LENGTH: usize = 64;

/// An Ed25519 signing identity with its derived Solana address.
///
/// The signing key is zeroized on drop by `ed25519-dalek`.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
    address: String,
}

impl Keypair {
    /// Build a keypair from 64 bytes of secret-key material.
    ///
    /// The trailing 32 bytes must be the public key of the leading 32-byte
    /// seed, otherwise the material is rejected.
    pub fn from_secret_key_bytes(bytes: &[u8]) -> Result<Self, SolError> {
        let mut material: [u8; KEYPAIR_LENGTH] = bytes.try_into().map_err(|_| {
            SolError::InvalidPrivateKey(format!(
                "expected {KEYPAIR_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;

        let result = SigningKey::from_keypair_bytes(&material).map_err(|_| {
            SolError::InvalidPublicKey("public key does not match secret seed".into())
        });
        material.zeroize();

        Ok(Self::from_signing_key(result?))
    }

    /// Build a keypair from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let mut seed = *seed;
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self::from_signing_key(signing_key)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = pubkey_to_address(&signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    /// The raw 32-byte public key.
    pub fn pubkey(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The Base58 address of this keypair.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The 64-byte secret-key material (seed followed by public key).
    ///
    /// The caller owns the returned bytes and should zeroize them.
    pub fn to_secret_key_bytes(&self) -> [u8; KEYPAIR_LENGTH] {
        self.signing_key.to_keypair_bytes()
    }

    /// Sign an arbitrary message, returning the 64-byte Ed25519 signature.
    pub fn sign_message(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
