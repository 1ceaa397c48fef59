//! Error types for the balance-query pipeline.

use thiserror::Error;

/// Errors produced while decoding or validating a TRON address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The string contains characters outside the Base58 alphabet.
    #[error("invalid Base58 encoding")]
    InvalidBase58,

    /// Decoded payload is not the 25 bytes a TRON address carries.
    #[error("wrong address length: decoded {len} bytes, expected 25")]
    WrongLength { len: usize },

    /// Trailing four bytes do not match the double-SHA256 of the payload.
    #[error("address checksum mismatch")]
    ChecksumMismatch,

    /// Payload too short to extract the 21-byte version + body.
    #[error("invalid TRON address")]
    InvalidAddress,
}

/// Errors from a single balance query.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("address encoding failed: {0}")]
    EncodingFailed(#[from] AddressError),

    /// Connection refused, timeout, body read failure and so on.
    #[error("request failed: {0}")]
    Transport(String),

    /// Terminal non-200 status (including exhausted 429 retries).
    #[error("API returned HTTP {status}")]
    RemoteError { status: u16 },

    /// The node answered but reported a failed call.
    #[error("query failed: {message}")]
    QueryFailed { message: String },

    /// Body was not the expected JSON or the balance was not valid hex.
    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    /// Returns `true` for failures the client retries (transport errors and HTTP 429).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RemoteError { status: 429 }
        )
    }
}

/// Errors from the credential pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("no API credentials available")]
    Empty,

    #[error("all API credentials have reached their usage limit")]
    Exhausted,

    #[error("API credential not found: {0}")]
    NotFound(String),

    #[error("no valid API credentials found in source")]
    NoValidCredentials,
}

/// Usage ledger read/write failure. Logged by the pool, never propagated.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("ledger IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger format error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors while loading address or credential lists.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no valid TRON addresses found (expected 34-character Base58Check strings starting with 'T')")]
    NoValidAddresses,
}
