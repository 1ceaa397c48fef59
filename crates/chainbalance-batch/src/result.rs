//! Per-address outcomes and batch summaries.

use std::fmt;

use serde::Serialize;

/// Lifecycle of one address within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Pending,
    Success,
    Error,
    Cancelled,
}

impl QueryStatus {
    /// `Pending` is the only non-terminal status.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one address query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub address: String,
    /// Decimal balance; set only on `Success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    pub status: QueryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    pub fn pending(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balance: None,
            status: QueryStatus::Pending,
            error: None,
        }
    }

    pub fn success(address: impl Into<String>, balance: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balance: Some(balance.into()),
            status: QueryStatus::Success,
            error: None,
        }
    }

    pub fn error(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balance: None,
            status: QueryStatus::Error,
            error: Some(message.into()),
        }
    }

    pub fn cancelled(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balance: None,
            status: QueryStatus::Cancelled,
            error: Some("cancelled".into()),
        }
    }
}

/// Outcome counts for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchStats {
    pub fn from_results(results: &[QueryResult]) -> Self {
        results.iter().fold(
            Self {
                total: results.len(),
                ..Self::default()
            },
            |mut stats, r| {
                match r.status {
                    QueryStatus::Success => stats.succeeded += 1,
                    QueryStatus::Error => stats.failed += 1,
                    QueryStatus::Cancelled => stats.cancelled += 1,
                    QueryStatus::Pending => {}
                }
                stats
            },
        )
    }

    /// Addresses that reached a terminal status.
    pub fn finished(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total: {} succeeded, {} failed, {} cancelled",
            self.total, self.succeeded, self.failed, self.cancelled
        )
    }
}
