//! chainbalance-http: HTTP transport for ChainBalance.
//!
//! [`HttpTransport`] implements [`chainbalance_core::BalanceTransport`] on
//! top of `reqwest`. Endpoint presets live in [`endpoints`].

pub mod client;
pub mod endpoints;

pub use client::{HttpTransport, HttpTransportConfig};
pub use endpoints::Network;
