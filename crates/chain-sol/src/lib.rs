//! Solana chain support for the dust vacuum.
//!
//! Handles Solana addresses, 64-byte keypairs, and the transaction wire
//! format (legacy and v0 messages) without pulling in `solana-sdk`, which
//! drags in 200+ transitive dependencies. Transactions are only decoded,
//! signed, and re-encoded here; building them is the burn service's job.

pub mod address;
pub mod error;
pub mod keypair;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use address::{address_to_bytes, pubkey_to_address, validate_address};
pub use error::SolError;
pub use keypair::{Keypair, KEYPAIR_LENGTH};
pub use transaction::{
    decode_compact_u16, encode_compact_u16, AddressTableLookup, CompiledInstruction, Message,
    MessageHeader, MessageVersion, VersionedTransaction, EMPTY_SIGNATURE,
};
