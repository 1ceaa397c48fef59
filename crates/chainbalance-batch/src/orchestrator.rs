//! `QueryOrchestrator`: bounded-concurrency batch execution.
//!
//! Workers are `tokio` tasks pulling indices from a shared atomic counter.
//! Each claimed address gets one credential from the pool and is queried
//! through a [`BalanceClient`] cached per credential, so a key's rate limiter
//! persists across every address it serves.
//!
//! Cancellation is cooperative: addresses claimed after [`cancel`] are
//! marked `Cancelled` without consuming a credential, and in-flight queries
//! stop before their next retry attempt. Dropping a `run` future mid-batch
//! cancels its workers and leaves the orchestrator `Cancelled`.
//!
//! [`cancel`]: QueryOrchestrator::cancel

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockWriteGuard};

use chainbalance_core::{BalanceClient, BalanceTransport, ClientConfig, ClientError, CredentialPool, PoolError};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::result::{BatchStats, QueryResult, QueryStatus};

/// Upper bound on worker tasks per batch.
pub const MAX_CONCURRENCY: usize = 50;

/// Error recorded for addresses left unqueried by a failed worker.
pub const WORKER_ABORTED: &str = "worker aborted";

/// Configuration for a [`QueryOrchestrator`].
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Settings for every per-credential client.
    pub client: ClientConfig,
}

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// No batch has run yet.
    Idle,
    Running,
    /// The last batch drained its queue without being cancelled.
    Completed,
    /// The last batch was cancelled before it finished.
    Cancelled,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("a batch is already running")]
    AlreadyRunning,
}

type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// Result rows of one batch. `run` tags rows with the batch that owns them so
/// a straggler from a dropped batch cannot write into the next one.
#[derive(Default)]
struct ResultTable {
    run: u64,
    rows: Vec<QueryResult>,
}

struct Shared {
    pool: Arc<CredentialPool>,
    transport: Arc<dyn BalanceTransport>,
    config: OrchestratorConfig,
    clients: Mutex<HashMap<String, Arc<BalanceClient>>>,
    results: RwLock<ResultTable>,
    state: Mutex<BatchState>,
    cancel: Mutex<CancellationToken>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn client_for(&self, key: &str) -> Arc<BalanceClient> {
        lock(&self.clients)
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(BalanceClient::new(
                    self.transport.clone(),
                    Some(key.to_string()),
                    self.config.client.clone(),
                ))
            })
            .clone()
    }

    async fn query_one(&self, address: &str, cancel: &CancellationToken) -> QueryResult {
        if cancel.is_cancelled() {
            return QueryResult::cancelled(address);
        }

        let key = match self.pool.next_credential() {
            Ok(key) => key,
            Err(e) => {
                debug!(address, error = %e, "no credential for address");
                return QueryResult::error(address, e.to_string());
            }
        };

        match self.client_for(&key).query_balance(address, cancel).await {
            Ok(balance) => {
                debug!(address, balance = %balance, "balance query succeeded");
                QueryResult::success(address, balance)
            }
            Err(ClientError::Cancelled) => QueryResult::cancelled(address),
            Err(e) => {
                debug!(address, error = %e, "balance query failed");
                QueryResult::error(address, e.to_string())
            }
        }
    }
}

/// Serialises terminal writes so the progress callback sees a strictly
/// increasing `completed` count.
struct Progress {
    run: u64,
    completed: Mutex<usize>,
    total: usize,
    callback: Arc<ProgressFn>,
}

impl Progress {
    fn record(&self, shared: &Shared, idx: usize, result: QueryResult) {
        debug_assert!(result.status.is_terminal());
        let mut completed = lock(&self.completed);
        {
            let mut table = write(&shared.results);
            if table.run != self.run {
                return;
            }
            let Some(slot) = table.rows.get_mut(idx) else {
                return;
            };
            *slot = result;
        }
        *completed += 1;
        (self.callback)(*completed, self.total);
    }

    /// Give every row still `Pending` a terminal result. Returns how many
    /// rows were settled.
    fn settle_pending(&self, shared: &Shared, cancel: &CancellationToken) -> usize {
        let mut completed = lock(&self.completed);
        let settled = {
            let mut table = write(&shared.results);
            if table.run != self.run {
                return 0;
            }
            let mut settled = 0;
            for row in table.rows.iter_mut().filter(|r| r.status == QueryStatus::Pending) {
                let address = std::mem::take(&mut row.address);
                *row = if cancel.is_cancelled() {
                    QueryResult::cancelled(address)
                } else {
                    QueryResult::error(address, WORKER_ABORTED)
                };
                settled += 1;
            }
            settled
        };
        for _ in 0..settled {
            *completed += 1;
            (self.callback)(*completed, self.total);
        }
        settled
    }
}

/// Held for the lifetime of a `run` call. If the call is dropped before
/// [`finish`](Self::finish), the batch token is cancelled and the
/// orchestrator leaves `Running`.
struct RunGuard {
    shared: Arc<Shared>,
    cancel: Option<DropGuard>,
}

impl RunGuard {
    fn finish(mut self, state: BatchState) {
        if let Some(guard) = self.cancel.take() {
            let _ = guard.disarm();
        }
        *lock(&self.shared.state) = state;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.shared.state);
        if *state == BatchState::Running {
            warn!("balance batch dropped before completion, cancelling workers");
            *state = BatchState::Cancelled;
        }
    }
}

async fn worker(
    shared: Arc<Shared>,
    addresses: Arc<Vec<String>>,
    next: Arc<AtomicUsize>,
    progress: Arc<Progress>,
    cancel: CancellationToken,
) {
    loop {
        let idx = next.fetch_add(1, Ordering::Relaxed);
        let Some(address) = addresses.get(idx) else {
            break;
        };
        let result = shared.query_one(address, &cancel).await;
        progress.record(&shared, idx, result);
    }
}

/// Batch balance query runner.
pub struct QueryOrchestrator {
    shared: Arc<Shared>,
}

impl QueryOrchestrator {
    pub fn new(
        pool: Arc<CredentialPool>,
        transport: Arc<dyn BalanceTransport>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                pool,
                transport,
                config,
                clients: Mutex::new(HashMap::new()),
                results: RwLock::new(ResultTable::default()),
                state: Mutex::new(BatchState::Idle),
                cancel: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Query every address and return once all of them are terminal.
    ///
    /// `concurrency` is clamped to `1..=50`. `on_progress(completed, total)`
    /// is called after every terminal result; `completed` reaches `total`
    /// exactly once.
    pub async fn run<F>(
        &self,
        addresses: Vec<String>,
        concurrency: usize,
        on_progress: F,
    ) -> Result<BatchStats, BatchError>
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.run_with_token(addresses, concurrency, CancellationToken::new(), on_progress)
            .await
    }

    /// [`run`](Self::run) under a caller-supplied cancellation token.
    ///
    /// Lets a front-end wire up its interrupt handler before the batch
    /// starts. A token that is already cancelled marks every address
    /// `Cancelled`.
    pub async fn run_with_token<F>(
        &self,
        addresses: Vec<String>,
        concurrency: usize,
        cancel: CancellationToken,
        on_progress: F,
    ) -> Result<BatchStats, BatchError>
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        let total = addresses.len();
        let run = {
            let mut state = lock(&self.shared.state);
            if *state == BatchState::Running {
                return Err(BatchError::AlreadyRunning);
            }
            *state = BatchState::Running;
            *lock(&self.shared.cancel) = cancel.clone();

            let mut table = write(&self.shared.results);
            table.run += 1;
            table.rows = addresses.iter().map(QueryResult::pending).collect();
            table.run
        };
        let guard = RunGuard {
            shared: self.shared.clone(),
            cancel: Some(cancel.clone().drop_guard()),
        };

        if self.shared.pool.is_empty() {
            let message = PoolError::Empty.to_string();
            write(&self.shared.results).rows = addresses
                .iter()
                .map(|a| QueryResult::error(a, message.clone()))
                .collect();
            on_progress(total, total);
            guard.finish(BatchState::Completed);
            info!(total, "no API credentials loaded, batch failed");
            return Ok(self.stats());
        }

        if total == 0 {
            on_progress(0, 0);
            guard.finish(BatchState::Completed);
            return Ok(self.stats());
        }

        let workers = concurrency.clamp(1, MAX_CONCURRENCY).min(total);
        info!(total, workers, credentials = self.shared.pool.len(), "starting balance batch");

        let addresses = Arc::new(addresses);
        let next = Arc::new(AtomicUsize::new(0));
        let progress = Arc::new(Progress {
            run,
            completed: Mutex::new(0),
            total,
            callback: Arc::new(on_progress),
        });

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                tokio::spawn(worker(
                    self.shared.clone(),
                    addresses.clone(),
                    next.clone(),
                    progress.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        for joined in futures::future::join_all(handles).await {
            if let Err(e) = joined {
                error!(error = %e, "batch worker terminated abnormally");
            }
        }
        let settled = progress.settle_pending(&self.shared, &cancel);
        if settled > 0 {
            warn!(settled, "addresses left unqueried by a failed worker");
        }

        let pool = self.shared.pool.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || pool.flush()).await {
            error!(error = %e, "failed to flush credential usage");
        }

        let final_state = if cancel.is_cancelled() {
            BatchState::Cancelled
        } else {
            BatchState::Completed
        };
        guard.finish(final_state);

        let stats = self.stats();
        info!(
            total = stats.total,
            succeeded = stats.succeeded,
            failed = stats.failed,
            cancelled = stats.cancelled,
            state = %final_state,
            "balance batch finished"
        );
        Ok(stats)
    }

    /// Request cancellation of the running batch.
    pub fn cancel(&self) {
        let token = lock(&self.shared.cancel).clone();
        if !token.is_cancelled() {
            info!("cancelling balance batch");
            token.cancel();
        }
    }

    /// Token of the current (or most recent) batch.
    pub fn cancel_token(&self) -> CancellationToken {
        lock(&self.shared.cancel).clone()
    }

    pub fn state(&self) -> BatchState {
        *lock(&self.shared.state)
    }

    /// Snapshot of the result table, in input order.
    pub fn results(&self) -> Vec<QueryResult> {
        self.shared
            .results
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rows
            .clone()
    }

    pub fn stats(&self) -> BatchStats {
        BatchStats::from_results(&self.shared.results.read().unwrap_or_else(PoisonError::into_inner).rows)
    }

    /// Index of the first address that still needs querying.
    pub fn first_unprocessed(&self) -> Option<usize> {
        self.shared
            .results
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rows
            .iter()
            .position(|r| matches!(r.status, QueryStatus::Pending | QueryStatus::Cancelled))
    }

    /// Addresses from [`first_unprocessed`](Self::first_unprocessed) onward.
    pub fn remaining_addresses(&self) -> Vec<String> {
        let table = self.shared.results.read().unwrap_or_else(PoisonError::into_inner);
        let results = &table.rows;
        results
            .iter()
            .position(|r| matches!(r.status, QueryStatus::Pending | QueryStatus::Cancelled))
            .map(|start| results[start..].iter().map(|r| r.address.clone()).collect())
            .unwrap_or_default()
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.shared.pool
    }
}
