//! TronGrid endpoint presets.
//!
//! Mainnet is the only network where the USDT contract holds real balances;
//! Shasta and Nile are the public testnets.

use std::fmt;
use std::str::FromStr;

use chainbalance_core::error::ClientError;

use crate::client::{HttpTransport, HttpTransportConfig};

const CALL_PATH: &str = "/wallet/triggerconstantcontract";

/// A TRON network served by TronGrid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Network {
    #[default]
    Mainnet,
    Shasta,
    Nile,
}

impl Network {
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://api.trongrid.io",
            Self::Shasta => "https://api.shasta.trongrid.io",
            Self::Nile => "https://nile.trongrid.io",
        }
    }

    /// Full `triggerconstantcontract` URL.
    pub fn call_url(self) -> String {
        format!("{}{CALL_PATH}", self.base_url())
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Shasta => write!(f, "shasta"),
            Self::Nile => write!(f, "nile"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "shasta" => Ok(Self::Shasta),
            "nile" => Ok(Self::Nile),
            other => Err(format!("unknown network '{other}' (expected mainnet, shasta or nile)")),
        }
    }
}

/// Normalise a user-supplied node URL: a bare host gets the call path appended.
pub fn call_url_for(node: &str) -> String {
    let node = node.trim().trim_end_matches('/');
    if node.ends_with(CALL_PATH) {
        node.to_string()
    } else {
        format!("{node}{CALL_PATH}")
    }
}

/// TronGrid mainnet transport.
pub fn trongrid_mainnet() -> Result<HttpTransport, ClientError> {
    trongrid(Network::Mainnet)
}

/// TronGrid transport for `network`.
pub fn trongrid(network: Network) -> Result<HttpTransport, ClientError> {
    HttpTransport::new(network.call_url(), HttpTransportConfig::default())
}
