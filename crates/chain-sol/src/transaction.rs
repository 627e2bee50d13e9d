//! Solana transaction wire format: decoding, signing, and re-encoding.
//!
//! Transactions arrive pre-built from a remote service, so this module only
//! needs to parse them, place our signature in the right slot, and write
//! them back out. Both legacy and version 0 messages are handled:
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     [version prefix]      u8, 0x80 | version (absent for legacy)
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        (see below)
//!     [lookups]             v0 only (see below)
//!
//! Instruction:
//!   program_id_index        u8
//!   num_accounts            compact-u16
//!   account_indices         u8 * num_accounts
//!   data_len                compact-u16
//!   data                    u8 * data_len
//!
//! Address table lookup (v0):
//!   account_key             32 bytes
//!   num_writable            compact-u16
//!   writable_indexes        u8 * num_writable
//!   num_readonly            compact-u16
//!   readonly_indexes        u8 * num_readonly
//! ```

use crate::address::pubkey_to_address;
use crate::error::SolError;
use crate::keypair::Keypair;

/// High bit set on the first message byte marks a versioned message.
const VERSION_PREFIX: u8 = 0x80;

/// A signature slot that has not been filled in yet.
pub const EMPTY_SIGNATURE: [u8; 64] = [0u8; 64];

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a `u16` value in Solana's compact-u16 format.
///
/// - Values 0..0x7f       -> 1 byte
/// - Values 0x80..0x3fff  -> 2 bytes
/// - Values 0x4000..      -> 3 bytes
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Decode a compact-u16 value from a byte slice.
///
/// Returns `(value, bytes_consumed)`. Truncated input, a continuation bit on
/// the third byte, overflow, and non-minimal encodings are all rejected.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), SolError> {
    let mut value: u32 = 0;
    let mut consumed = 0usize;

    loop {
        let byte = *data.get(consumed).ok_or_else(|| {
            SolError::SerializationError(
                "unexpected end of data while decoding compact-u16".into(),
            )
        })?;
        value |= ((byte & 0x7f) as u32) << (7 * consumed);
        consumed += 1;

        if byte & 0x80 == 0 {
            break;
        }
        if consumed == 3 {
            return Err(SolError::SerializationError(
                "compact-u16 longer than 3 bytes".into(),
            ));
        }
    }

    let value = u16::try_from(value)
        .map_err(|_| SolError::SerializationError("compact-u16 value overflow".into()))?;

    if encode_compact_u16(value).len() != consumed {
        return Err(SolError::SerializationError(
            "non-canonical compact-u16 encoding".into(),
        ));
    }

    Ok((value, consumed))
}

fn encode_len(len: usize, out: &mut Vec<u8>) -> Result<(), SolError> {
    let len = u16::try_from(len)
        .map_err(|_| SolError::SerializationError(format!("length {len} exceeds u16")))?;
    out.extend_from_slice(&encode_compact_u16(len));
    Ok(())
}

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageVersion {
    Legacy,
    V0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Number of required signatures (first N account keys are signers).
    pub num_required_signatures: u8,
    /// How many of the signing accounts are read-only.
    pub num_readonly_signed: u8,
    /// How many of the non-signing accounts are read-only.
    pub num_readonly_unsigned: u8,
}

/// A compiled instruction where account references are u8 indices into the
/// message's account keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

/// Reference to accounts loaded from an on-chain address lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressTableLookup {
    pub account_key: [u8; 32],
    pub writable_indexes: Vec<u8>,
    pub readonly_indexes: Vec<u8>,
}

/// The signed portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: MessageVersion,
    pub header: MessageHeader,
    pub account_keys: Vec<[u8; 32]>,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
    /// Always empty for legacy messages.
    pub address_table_lookups: Vec<AddressTableLookup>,
}

/// A decoded transaction: signature slots plus the message they cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedTransaction {
    pub signatures: Vec<[u8; 64]>,
    pub message: Message,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], SolError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| SolError::SerializationError(format!("transaction too short for {what}")))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8, SolError> {
        Ok(self.take(1, what)?[0])
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn compact_len(&mut self) -> Result<usize, SolError> {
        let (value, consumed) = decode_compact_u16(&self.data[self.pos..])?;
        self.pos += consumed;
        Ok(value as usize)
    }

    fn key(&mut self, what: &str) -> Result<[u8; 32], SolError> {
        let mut key = [0u8; 32];
        key.copy_from_slice(self.take(32, what)?);
        Ok(key)
    }

    fn byte_vec(&mut self, what: &str) -> Result<Vec<u8>, SolError> {
        let len = self.compact_len()?;
        Ok(self.take(len, what)?.to_vec())
    }

    fn finish(&self) -> Result<(), SolError> {
        if self.pos != self.data.len() {
            return Err(SolError::SerializationError(format!(
                "{} trailing bytes after transaction",
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }
}

impl Message {
    fn read(reader: &mut Reader<'_>) -> Result<Self, SolError> {
        let first = reader
            .peek()
            .ok_or_else(|| SolError::SerializationError("transaction has no message".into()))?;

        let version = if first & VERSION_PREFIX != 0 {
            reader.u8("version prefix")?;
            match first & !VERSION_PREFIX {
                0 => MessageVersion::V0,
                other => {
                    return Err(SolError::SerializationError(format!(
                        "unsupported message version {other}"
                    )))
                }
            }
        } else {
            MessageVersion::Legacy
        };

        let header = MessageHeader {
            num_required_signatures: reader.u8("message header")?,
            num_readonly_signed: reader.u8("message header")?,
            num_readonly_unsigned: reader.u8("message header")?,
        };

        let num_accounts = reader.compact_len()?;
        let mut account_keys = Vec::with_capacity(num_accounts);
        for _ in 0..num_accounts {
            account_keys.push(reader.key("account keys")?);
        }

        if (header.num_required_signatures as usize) > account_keys.len() {
            return Err(SolError::SerializationError(format!(
                "{} required signatures but only {} account keys",
                header.num_required_signatures,
                account_keys.len()
            )));
        }

        let recent_blockhash = reader.key("recent blockhash")?;

        let num_instructions = reader.compact_len()?;
        let mut instructions = Vec::with_capacity(num_instructions);
        for _ in 0..num_instructions {
            instructions.push(CompiledInstruction {
                program_id_index: reader.u8("instruction")?,
                account_indices: reader.byte_vec("instruction accounts")?,
                data: reader.byte_vec("instruction data")?,
            });
        }

        let mut address_table_lookups = Vec::new();
        if version == MessageVersion::V0 {
            let num_lookups = reader.compact_len()?;
            for _ in 0..num_lookups {
                address_table_lookups.push(AddressTableLookup {
                    account_key: reader.key("lookup table key")?,
                    writable_indexes: reader.byte_vec("lookup writable indexes")?,
                    readonly_indexes: reader.byte_vec("lookup readonly indexes")?,
                });
            }
        }

        Ok(Self {
            version,
            header,
            account_keys,
            recent_blockhash,
            instructions,
            address_table_lookups,
        })
    }

    /// Decode a serialized message.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, SolError> {
        let mut reader = Reader::new(bytes);
        let message = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(message)
    }

    /// Serialize the message (the bytes that get signed).
    pub fn serialize(&self) -> Result<Vec<u8>, SolError> {
        let mut buf = Vec::with_capacity(256);

        if self.version == MessageVersion::V0 {
            buf.push(VERSION_PREFIX);
        }

        buf.push(self.header.num_required_signatures);
        buf.push(self.header.num_readonly_signed);
        buf.push(self.header.num_readonly_unsigned);

        encode_len(self.account_keys.len(), &mut buf)?;
        for key in &self.account_keys {
            buf.extend_from_slice(key);
        }

        buf.extend_from_slice(&self.recent_blockhash);

        encode_len(self.instructions.len(), &mut buf)?;
        for ix in &self.instructions {
            buf.push(ix.program_id_index);
            encode_len(ix.account_indices.len(), &mut buf)?;
            buf.extend_from_slice(&ix.account_indices);
            encode_len(ix.data.len(), &mut buf)?;
            buf.extend_from_slice(&ix.data);
        }

        if self.version == MessageVersion::V0 {
            encode_len(self.address_table_lookups.len(), &mut buf)?;
            for lookup in &self.address_table_lookups {
                buf.extend_from_slice(&lookup.account_key);
                encode_len(lookup.writable_indexes.len(), &mut buf)?;
                buf.extend_from_slice(&lookup.writable_indexes);
                encode_len(lookup.readonly_indexes.len(), &mut buf)?;
                buf.extend_from_slice(&lookup.readonly_indexes);
            }
        }

        Ok(buf)
    }

    /// Position of `pubkey` among the required signers, if present.
    pub fn signer_index(&self, pubkey: &[u8; 32]) -> Option<usize> {
        self.account_keys
            .iter()
            .take(self.header.num_required_signatures as usize)
            .position(|key| key == pubkey)
    }

    /// The fee payer is always the first account key.
    pub fn fee_payer(&self) -> Option<String> {
        self.account_keys.first().map(pubkey_to_address)
    }
}

impl VersionedTransaction {
    /// Decode a wire-format transaction.
    ///
    /// The number of signature slots must match the message header's
    /// required-signature count, and no bytes may follow the message.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, SolError> {
        let mut reader = Reader::new(raw);

        let num_sigs = reader.compact_len()?;
        let mut signatures = Vec::with_capacity(num_sigs);
        for _ in 0..num_sigs {
            let mut sig = [0u8; 64];
            sig.copy_from_slice(reader.take(64, "signature slots")?);
            signatures.push(sig);
        }

        let message = Message::read(&mut reader)?;
        reader.finish()?;

        if signatures.len() != message.header.num_required_signatures as usize {
            return Err(SolError::SerializationError(format!(
                "transaction has {} signature slots but message requires {}",
                signatures.len(),
                message.header.num_required_signatures
            )));
        }

        Ok(Self {
            signatures,
            message,
        })
    }

    /// Encode into wire format, ready for `sendTransaction`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SolError> {
        let message = self.message.serialize()?;
        let mut wire = Vec::with_capacity(3 + self.signatures.len() * 64 + message.len());

        encode_len(self.signatures.len(), &mut wire)?;
        for sig in &self.signatures {
            wire.extend_from_slice(sig);
        }
        wire.extend_from_slice(&message);

        Ok(wire)
    }

    /// Sign the message with `keypair` and write the signature into the slot
    /// belonging to its public key. Other slots are left untouched.
    pub fn sign(&mut self, keypair: &Keypair) -> Result<(), SolError> {
        let index = self.message.signer_index(&keypair.pubkey()).ok_or_else(|| {
            SolError::SigningError(format!(
                "wallet {} not found in transaction signers",
                keypair.address()
            ))
        })?;

        let message = self.message.serialize()?;
        self.signatures[index] = keypair.sign_message(&message);
        Ok(())
    }

    /// The transaction id: the Base58 form of the first signature.
    pub fn signature(&self) -> Option<String> {
        self.signatures
            .first()
            .filter(|sig| **sig != EMPTY_SIGNATURE)
            .map(|sig| bs58::encode(sig).into_string())
    }

    /// Whether every required signature slot has been filled.
    pub fn is_fully_signed(&self) -> bool {
        self.signatures.iter().all(|sig| *sig != EMPTY_SIGNATURE)
    }
}
