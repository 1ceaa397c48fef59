//! chainbalance-core: foundation types for ChainBalance.
//!
//! # Overview
//!
//! ChainBalance batch-queries TRC-20 token balances for many TRON addresses
//! against a rate-limited, key-gated HTTP API. The core crate defines:
//!
//! - [`address`]: Base58Check validation and contract-call encodings
//! - [`BalanceTransport`]: the async seam for one POST to the remote node
//! - [`BalanceClient`]: one balance query with pacing, retry and parsing
//! - [`CredentialPool`]: round-robin API key selection with a usage ledger
//! - [`policy`] module: token bucket rate limiter and retry back-off
//! - [`ingest`] module: address and credential list loading

pub mod address;
pub mod amount;
pub mod client;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod policy;
pub mod pool;
pub mod request;
pub mod transport;

pub use address::TronAddress;
pub use client::{AddressFormat, BalanceClient, ClientConfig};
pub use error::{AddressError, ClientError, IngestError, PersistenceError, PoolError};
pub use ledger::{FileLedger, MemoryLedger, UsageLedger};
pub use pool::{CredentialPool, CredentialStatus, PoolConfig};
pub use request::{TriggerConstantContractRequest, TriggerConstantContractResponse};
pub use transport::{BalanceTransport, RawResponse};

pub use tokio_util::sync::CancellationToken;
