//! chainbalance-batch: concurrent batch balance queries.
//!
//! [`QueryOrchestrator`] fans a list of addresses out over a bounded set of
//! worker tasks, drawing one credential per address from a shared
//! [`CredentialPool`](chainbalance_core::CredentialPool), and records one
//! terminal [`QueryResult`] per address.

pub mod orchestrator;
pub mod result;

pub use orchestrator::{BatchError, BatchState, OrchestratorConfig, QueryOrchestrator};
pub use result::{BatchStats, QueryResult, QueryStatus};
