//! TRON address codec.
//!
//! A TRON address is a Base58Check string decoding to 25 bytes:
//!
//! ```text
//! [0x41][20-byte account body][4-byte checksum]
//! ```
//!
//! The checksum is the first four bytes of `sha256(sha256(bytes[0..21]))`.
//!
//! `triggerconstantcontract` needs the same account in two shapes: the
//! caller field takes the 21-byte version + body, while the ABI argument
//! takes the 20-byte body left-padded to a 32-byte word. Both are exposed
//! as separate functions so callers cannot mix them up.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::error::AddressError;

/// Decoded length of a full address (version + body + checksum).
pub const ADDRESS_LEN: usize = 25;
/// Version byte + account body.
pub const PAYLOAD_LEN: usize = 21;
const CHECKSUM_LEN: usize = 4;
const ABI_WORD_LEN: usize = 32;

fn decode(raw: &str) -> Result<Vec<u8>, AddressError> {
    bs58::decode(raw.trim())
        .into_vec()
        .map_err(|_| AddressError::InvalidBase58)
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

/// Returns `true` if `raw` is a well-formed, correctly checksummed address.
pub fn validate(raw: &str) -> bool {
    validate_with_reason(raw).is_ok()
}

/// Like [`validate`] but reports why the address was rejected.
pub fn validate_with_reason(raw: &str) -> Result<(), AddressError> {
    let decoded = decode(raw)?;
    if decoded.len() != ADDRESS_LEN {
        return Err(AddressError::WrongLength { len: decoded.len() });
    }
    let (payload, check) = decoded.split_at(PAYLOAD_LEN);
    if checksum(payload) != check {
        return Err(AddressError::ChecksumMismatch);
    }
    Ok(())
}

/// Encode the address as a 32-byte ABI word (64 lowercase hex chars).
///
/// The version byte is dropped; the 20-byte body fills the low end of the
/// word and the top 12 bytes are zero.
pub fn to_call_parameter(raw: &str) -> Result<String, AddressError> {
    let decoded = decode(raw)?;
    if decoded.len() < PAYLOAD_LEN {
        return Err(AddressError::InvalidAddress);
    }
    let mut word = [0u8; ABI_WORD_LEN];
    word[ABI_WORD_LEN - (PAYLOAD_LEN - 1)..].copy_from_slice(&decoded[1..PAYLOAD_LEN]);
    Ok(hex::encode(word))
}

/// Encode the address as its 21-byte version + body (42 lowercase hex chars).
pub fn to_owner_hex(raw: &str) -> Result<String, AddressError> {
    let decoded = decode(raw)?;
    if decoded.len() < PAYLOAD_LEN {
        return Err(AddressError::InvalidAddress);
    }
    Ok(hex::encode(&decoded[..PAYLOAD_LEN]))
}

/// A validated TRON address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TronAddress(String);

impl TronAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn call_parameter(&self) -> String {
        // Validated on construction, so decoding cannot fail.
        to_call_parameter(&self.0).unwrap_or_default()
    }

    pub fn owner_hex(&self) -> String {
        to_owner_hex(&self.0).unwrap_or_default()
    }
}

impl FromStr for TronAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        validate_with_reason(trimmed)?;
        Ok(Self(trimmed.to_string()))
    }
}

impl fmt::Display for TronAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TronAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
