//! Balance query client bound to one API credential.
//!
//! Each query goes through:
//!
//! ```text
//! acquire token → encode address → POST (≤ 3 attempts) → parse → format
//! ```
//!
//! Only HTTP 429 and transport failures are retried. Everything else is a
//! terminal error for that address.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::address;
use crate::amount::DEFAULT_DECIMALS;
use crate::error::ClientError;
use crate::policy::retry::RetryReason;
use crate::policy::{RateLimiter, RateLimiterConfig, RetryConfig, RetryPolicy};
use crate::request::{TriggerConstantContractRequest, TriggerConstantContractResponse};
use crate::transport::{BalanceTransport, RawResponse};

/// USDT TRC-20 contract on TRON mainnet.
pub const USDT_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
/// ERC-20/TRC-20 balance getter.
pub const BALANCE_OF_SELECTOR: &str = "balanceOf(address)";

/// How account addresses are written into the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressFormat {
    /// Base58 owner/contract with `visible: true`.
    #[default]
    Visible,
    /// 21-byte hex owner/contract with `visible: false`.
    Hex,
}

/// Configuration for a [`BalanceClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub rate_limiter: RateLimiterConfig,
    pub retry: RetryConfig,
    pub contract_address: String,
    pub function_selector: String,
    pub decimals: u32,
    pub address_format: AddressFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rate_limiter: RateLimiterConfig::default(),
            retry: RetryConfig::default(),
            contract_address: USDT_CONTRACT.into(),
            function_selector: BALANCE_OF_SELECTOR.into(),
            decimals: DEFAULT_DECIMALS,
            address_format: AddressFormat::Visible,
        }
    }
}

/// Token balance client with its own rate limiter.
pub struct BalanceClient {
    transport: Arc<dyn BalanceTransport>,
    api_key: Option<String>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    contract_address: String,
    function_selector: String,
    decimals: u32,
    address_format: AddressFormat,
}

impl BalanceClient {
    /// Create a client; `api_key` is sent as `TRON-PRO-API-KEY` when present.
    pub fn new(
        transport: Arc<dyn BalanceTransport>,
        api_key: Option<String>,
        config: ClientConfig,
    ) -> Self {
        Self {
            transport,
            api_key: api_key.filter(|k| !k.is_empty()),
            limiter: RateLimiter::new(config.rate_limiter),
            retry: RetryPolicy::new(config.retry),
            contract_address: config.contract_address,
            function_selector: config.function_selector,
            decimals: config.decimals,
            address_format: config.address_format,
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Build the contract-call body for `address`.
    pub fn build_request(&self, address: &str) -> Result<TriggerConstantContractRequest, ClientError> {
        let address = address.trim();
        let owner_hex = address::to_owner_hex(address)?;
        let parameter = address::to_call_parameter(address)?;

        let (owner_address, contract_address, visible) = match self.address_format {
            AddressFormat::Visible => (address.to_string(), self.contract_address.clone(), true),
            AddressFormat::Hex => (
                owner_hex,
                address::to_owner_hex(&self.contract_address)?,
                false,
            ),
        };

        Ok(TriggerConstantContractRequest {
            owner_address,
            contract_address,
            function_selector: self.function_selector.clone(),
            parameter,
            visible,
        })
    }

    /// Query the token balance of `address` as a decimal string.
    pub async fn query_balance(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ClientError> {
        self.limiter.acquire().await;

        let req = self.build_request(address)?;
        let resp = self.send_with_retry(&req, cancel).await?;
        if !resp.is_ok() {
            return Err(ClientError::RemoteError {
                status: resp.status,
            });
        }

        TriggerConstantContractResponse::from_body(&resp.body)?.into_balance(self.decimals)
    }

    async fn send_with_retry(
        &self,
        req: &TriggerConstantContractRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, ClientError> {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            attempt += 1;

            let (reason, outcome) = match self.transport.post(req, self.api_key()).await {
                Ok(resp) if resp.is_rate_limited() => (RetryReason::RateLimited, Ok(resp)),
                Ok(resp) => return Ok(resp),
                Err(e @ ClientError::Transport(_)) => (RetryReason::Transport, Err(e)),
                Err(e) => return Err(e),
            };

            match self.retry.next_delay(attempt, reason) {
                Some(delay) => {
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = ?reason,
                        url = %self.transport.url(),
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(
                        attempt,
                        reason = ?reason,
                        url = %self.transport.url(),
                        "max retries exceeded"
                    );
                    return outcome;
                }
            }
        }
    }
}
