//! The `BalanceTransport` trait: one HTTP round-trip to the remote node.

use async_trait::async_trait;

use crate::error::ClientError;
use crate::request::TriggerConstantContractRequest;

/// Header carrying the TronGrid API key.
pub const API_KEY_HEADER: &str = "TRON-PRO-API-KEY";

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Sends a single contract-call request.
///
/// Implementations return `Ok` for any HTTP response, whatever its status,
/// and `Err(ClientError::Transport)` only when no response was received.
/// Retry and status interpretation belong to
/// [`BalanceClient`](crate::client::BalanceClient).
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; one transport is shared by every
/// credential-bound client as `Arc<dyn BalanceTransport>`.
#[async_trait]
pub trait BalanceTransport: Send + Sync + 'static {
    async fn post(
        &self,
        req: &TriggerConstantContractRequest,
        api_key: Option<&str>,
    ) -> Result<RawResponse, ClientError>;

    /// Endpoint URL or a descriptive name.
    fn url(&self) -> &str;
}
