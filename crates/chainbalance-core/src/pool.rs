//! API credential pool with round-robin selection and persisted usage.
//!
//! Every successful [`CredentialPool::next_credential`] call increments the
//! chosen key's counter under the pool lock and queues a ledger snapshot to
//! the background writer. Counters loaded from the ledger are carried
//! forward, so a key's usage never resets between runs.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::PoolError;
use crate::ledger::{LedgerWriter, MemoryLedger, UsageLedger, UsageMap};

/// Default per-key quota (TronGrid free tier: 100k requests/day).
pub const DEFAULT_USAGE_LIMIT: u64 = 100_000;

/// Configuration for the credential pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Selections allowed per key before it is considered exhausted.
    pub usage_limit: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            usage_limit: DEFAULT_USAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone)]
struct Credential {
    key: String,
    used: u64,
    usage_limit: u64,
    enabled: bool,
}

impl Credential {
    fn is_available(&self) -> bool {
        self.enabled && self.used < self.usage_limit
    }
}

/// Point-in-time view of one credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub key: String,
    pub used: u64,
    pub remaining: u64,
    pub usage_limit: u64,
    pub enabled: bool,
    /// `Key 1`, `Key 2`, … in pool order.
    pub display_name: String,
}

#[derive(Default)]
struct PoolState {
    credentials: Vec<Credential>,
    /// Ledger entries for keys not currently loaded; written back unchanged.
    dormant: UsageMap,
    cursor: usize,
    total_used: u64,
}

impl PoolState {
    fn usage(&self) -> UsageMap {
        let mut usage = self.dormant.clone();
        usage.extend(self.credentials.iter().map(|c| (c.key.clone(), c.used)));
        usage
    }

    fn retire(&mut self, cred: Credential) {
        self.dormant.insert(cred.key, cred.used);
    }

    fn clamp_cursor(&mut self) {
        if self.cursor >= self.credentials.len() {
            self.cursor = 0;
        }
    }

    fn take(&mut self, idx: usize) -> String {
        let cred = &mut self.credentials[idx];
        cred.used += 1;
        self.total_used += 1;
        cred.key.clone()
    }
}

/// Thread-safe pool of API credentials.
pub struct CredentialPool {
    config: PoolConfig,
    state: Mutex<PoolState>,
    ledger: Arc<dyn UsageLedger>,
    writer: LedgerWriter,
}

impl CredentialPool {
    /// Create an empty pool backed by `ledger`.
    pub fn new(ledger: Arc<dyn UsageLedger>, config: PoolConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PoolState::default()),
            writer: LedgerWriter::spawn(ledger.clone()),
            ledger,
        }
    }

    /// Pool with an in-memory ledger and default limits.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryLedger::new()), PoolConfig::default())
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persisted_usage(&self) -> UsageMap {
        match self.ledger.load() {
            Ok(usage) => usage,
            Err(e) => {
                tracing::warn!(error = %e, location = %self.ledger.location(), "ignoring unreadable usage ledger");
                UsageMap::new()
            }
        }
    }

    /// Replace the pool contents with `entries`.
    ///
    /// Entries are trimmed, blanks skipped and duplicates dropped (first
    /// occurrence wins). Counters for keys seen in earlier runs are taken
    /// from the ledger.
    pub fn load_from_source<I, S>(&self, entries: I) -> Result<(), PoolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let keys: Vec<String> = entries
            .into_iter()
            .filter_map(|e| {
                let key = e.as_ref().trim();
                (!key.is_empty() && seen.insert(key.to_string())).then(|| key.to_string())
            })
            .collect();

        if keys.is_empty() {
            return Err(PoolError::NoValidCredentials);
        }

        let mut dormant = self.persisted_usage();
        let credentials: Vec<Credential> = keys
            .into_iter()
            .map(|key| Credential {
                used: dormant.remove(&key).unwrap_or(0),
                key,
                usage_limit: self.config.usage_limit,
                enabled: true,
            })
            .collect();

        let mut state = self.lock();
        tracing::info!(
            count = credentials.len(),
            carried_over = credentials.iter().filter(|c| c.used > 0).count(),
            "loaded API credentials"
        );
        state.credentials = credentials;
        state.dormant = dormant;
        state.cursor = 0;
        self.writer.submit(state.usage());
        Ok(())
    }

    /// Re-read the ledger into the keys already loaded.
    ///
    /// A counter is only ever raised, never lowered.
    pub fn merge_persisted(&self) {
        let persisted = self.persisted_usage();
        let mut guard = self.lock();
        let PoolState {
            credentials,
            dormant,
            ..
        } = &mut *guard;
        for (key, used) in persisted {
            match credentials.iter_mut().find(|c| c.key == key) {
                Some(cred) => cred.used = cred.used.max(used),
                None => {
                    let entry = dormant.entry(key).or_insert(0);
                    *entry = (*entry).max(used);
                }
            }
        }
    }

    /// Remove a single credential.
    pub fn remove(&self, key: &str) -> Result<(), PoolError> {
        let mut state = self.lock();
        let idx = state
            .credentials
            .iter()
            .position(|c| c.key == key)
            .ok_or_else(|| PoolError::NotFound(key.to_string()))?;
        let cred = state.credentials.remove(idx);
        state.retire(cred);
        state.clamp_cursor();
        self.writer.submit(state.usage());
        Ok(())
    }

    /// Remove every credential whose usage is at or above `threshold`.
    /// Returns how many were removed.
    pub fn remove_by_usage_threshold(&self, threshold: u64) -> usize {
        let mut state = self.lock();
        let (retired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.credentials)
            .into_iter()
            .partition(|c| c.used >= threshold);
        state.credentials = kept;
        let removed = retired.len();
        for cred in retired {
            state.retire(cred);
        }
        state.clamp_cursor();
        if removed > 0 {
            tracing::info!(removed, threshold, "retired used-up API credentials");
        }
        self.writer.submit(state.usage());
        removed
    }

    /// Enable or disable a credential without removing it.
    pub fn set_enabled(&self, key: &str, enabled: bool) -> Result<(), PoolError> {
        let mut state = self.lock();
        let cred = state
            .credentials
            .iter_mut()
            .find(|c| c.key == key)
            .ok_or_else(|| PoolError::NotFound(key.to_string()))?;
        cred.enabled = enabled;
        Ok(())
    }

    /// Select the next usable credential and count one use against it.
    pub fn next_credential(&self) -> Result<String, PoolError> {
        let mut state = self.lock();
        let len = state.credentials.len();
        if len == 0 {
            return Err(PoolError::Empty);
        }

        let selected = if len == 1 {
            state.credentials[0].is_available().then_some(0)
        } else {
            state.clamp_cursor();
            let start = state.cursor;
            (0..len)
                .map(|i| (start + i) % len)
                .find(|&idx| state.credentials[idx].is_available())
        };

        let Some(idx) = selected else {
            return Err(PoolError::Exhausted);
        };
        let key = state.take(idx);
        if len > 1 {
            state.cursor = (idx + 1) % len;
        }
        self.writer.submit(state.usage());
        Ok(key)
    }

    /// Per-credential usage snapshot in pool order.
    pub fn status(&self) -> Vec<CredentialStatus> {
        self.lock()
            .credentials
            .iter()
            .enumerate()
            .map(|(i, c)| CredentialStatus {
                key: c.key.clone(),
                used: c.used,
                remaining: c.usage_limit.saturating_sub(c.used),
                usage_limit: c.usage_limit,
                enabled: c.enabled,
                display_name: format!("Key {}", i + 1),
            })
            .collect()
    }

    /// Usage of `key`, if it is in the pool.
    pub fn used(&self, key: &str) -> Option<u64> {
        self.lock()
            .credentials
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.used)
    }

    /// Selections made through this pool instance.
    pub fn total_used(&self) -> u64 {
        self.lock().total_used
    }

    pub fn len(&self) -> usize {
        self.lock().credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().credentials.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().credentials.iter().map(|c| c.key.clone()).collect()
    }

    pub fn ledger_location(&self) -> String {
        self.ledger.location()
    }

    /// Wait for queued ledger writes to complete.
    pub fn flush(&self) {
        self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FileLedger;

    fn pool_with_limit(limit: u64) -> (CredentialPool, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new());
        let pool = CredentialPool::new(ledger.clone(), PoolConfig { usage_limit: limit });
        (pool, ledger)
    }

    #[test]
    fn load_dedups_and_trims() {
        let pool = CredentialPool::in_memory();
        pool.load_from_source(["a", " b ", "a", "", "  ", "c"]).unwrap();
        assert_eq!(pool.keys(), vec!["a", "b", "c"]);
    }

    #[test]
    fn load_empty_source_fails() {
        let pool = CredentialPool::in_memory();
        assert_eq!(
            pool.load_from_source(Vec::<String>::new()),
            Err(PoolError::NoValidCredentials)
        );
        assert_eq!(pool.load_from_source(["", "  "]), Err(PoolError::NoValidCredentials));
    }

    #[test]
    fn load_carries_persisted_usage() {
        let ledger = Arc::new(MemoryLedger::with_usage(
            [("a".to_string(), 40u64), ("gone".to_string(), 7)].into_iter().collect(),
        ));
        let pool = CredentialPool::new(ledger.clone(), PoolConfig::default());
        pool.load_from_source(["a", "b"]).unwrap();
        assert_eq!(pool.used("a"), Some(40));
        assert_eq!(pool.used("b"), Some(0));

        pool.flush();
        let saved = ledger.snapshot();
        assert_eq!(saved["gone"], 7, "entries for unloaded keys are kept");
        assert_eq!(saved["a"], 40);
    }

    #[test]
    fn removed_key_keeps_its_count() {
        let (pool, ledger) = pool_with_limit(10);
        pool.load_from_source(["a", "b"]).unwrap();
        pool.next_credential().unwrap(); // a
        pool.remove("a").unwrap();
        pool.flush();
        assert_eq!(ledger.snapshot()["a"], 1);

        pool.load_from_source(["a", "b"]).unwrap();
        assert_eq!(pool.used("a"), Some(1));
    }

    #[test]
    fn empty_pool() {
        let pool = CredentialPool::in_memory();
        assert_eq!(pool.next_credential(), Err(PoolError::Empty));
    }

    #[test]
    fn round_robin_rotation() {
        let pool = CredentialPool::in_memory();
        pool.load_from_source(["a", "b", "c"]).unwrap();
        let picks: Vec<String> = (0..6).map(|_| pool.next_credential().unwrap()).collect();
        assert_eq!(picks, vec!["a", "b", "c", "a", "b", "c"]);
        assert_eq!(pool.total_used(), 6);
    }

    #[test]
    fn single_credential_exhausts_at_limit() {
        let (pool, _) = pool_with_limit(3);
        pool.load_from_source(["only"]).unwrap();
        for _ in 0..3 {
            assert_eq!(pool.next_credential().unwrap(), "only");
        }
        assert_eq!(pool.next_credential(), Err(PoolError::Exhausted));
        assert_eq!(pool.used("only"), Some(3));
    }

    #[test]
    fn rotation_skips_exhausted_and_disabled() {
        let (pool, _) = pool_with_limit(1);
        pool.load_from_source(["a", "b", "c"]).unwrap();
        pool.set_enabled("b", false).unwrap();
        assert_eq!(pool.next_credential().unwrap(), "a");
        assert_eq!(pool.next_credential().unwrap(), "c");
        assert_eq!(pool.next_credential(), Err(PoolError::Exhausted));
    }

    #[test]
    fn never_returns_a_key_at_its_limit() {
        let (pool, _) = pool_with_limit(5);
        pool.load_from_source(["a", "b"]).unwrap();
        let mut count = 0;
        while pool.next_credential().is_ok() {
            count += 1;
        }
        assert_eq!(count, 10);
        assert!(pool.status().iter().all(|s| s.used == 5 && s.remaining == 0));
    }

    #[test]
    fn last_use_reaches_limit_then_exhausted() {
        let ledger = Arc::new(MemoryLedger::with_usage(
            [("k".to_string(), DEFAULT_USAGE_LIMIT - 1)].into_iter().collect(),
        ));
        let pool = CredentialPool::new(ledger.clone(), PoolConfig::default());
        pool.load_from_source(["k"]).unwrap();

        assert_eq!(pool.next_credential().unwrap(), "k");
        assert_eq!(pool.used("k"), Some(DEFAULT_USAGE_LIMIT));
        assert_eq!(pool.next_credential(), Err(PoolError::Exhausted));

        pool.flush();
        assert_eq!(ledger.snapshot()["k"], DEFAULT_USAGE_LIMIT);
    }

    #[test]
    fn remove_resets_cursor_past_end() {
        let pool = CredentialPool::in_memory();
        pool.load_from_source(["a", "b", "c"]).unwrap();
        pool.next_credential().unwrap(); // a
        pool.next_credential().unwrap(); // b, cursor → 2
        pool.remove("c").unwrap();
        assert_eq!(pool.next_credential().unwrap(), "a");
        assert_eq!(pool.remove("zzz"), Err(PoolError::NotFound("zzz".into())));
    }

    #[test]
    fn remove_by_threshold() {
        let (pool, _) = pool_with_limit(100);
        pool.load_from_source(["a", "b", "c"]).unwrap();
        for _ in 0..4 {
            pool.next_credential().unwrap(); // a, b, c, a
        }
        assert_eq!(pool.remove_by_usage_threshold(2), 1);
        assert_eq!(pool.keys(), vec!["b", "c"]);
        assert_eq!(pool.remove_by_usage_threshold(50), 0);
    }

    #[test]
    fn status_view() {
        let (pool, _) = pool_with_limit(10);
        pool.load_from_source(["a", "b"]).unwrap();
        pool.next_credential().unwrap();
        let status = pool.status();
        assert_eq!(status[0].display_name, "Key 1");
        assert_eq!(status[0].used, 1);
        assert_eq!(status[0].remaining, 9);
        assert_eq!(status[1].display_name, "Key 2");
        assert_eq!(status[1].remaining, 10);
    }

    #[test]
    fn merge_persisted_only_raises() {
        let ledger = Arc::new(MemoryLedger::new());
        let pool = CredentialPool::new(ledger.clone(), PoolConfig::default());
        pool.load_from_source(["a", "b"]).unwrap();
        pool.next_credential().unwrap(); // a = 1
        pool.flush();

        ledger
            .save(&[("a".to_string(), 0u64), ("b".to_string(), 9)].into_iter().collect())
            .unwrap();
        pool.merge_persisted();
        assert_eq!(pool.used("a"), Some(1));
        assert_eq!(pool.used("b"), Some(9));
    }

    #[test]
    fn usage_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apikey_stats.json");

        let first = CredentialPool::new(Arc::new(FileLedger::new(&path)), PoolConfig::default());
        first.load_from_source(["a", "b"]).unwrap();
        for _ in 0..5 {
            first.next_credential().unwrap();
        }
        first.flush();
        let before = first.status();

        let second = CredentialPool::new(Arc::new(FileLedger::new(&path)), PoolConfig::default());
        second.load_from_source(["a", "b"]).unwrap();
        let after = second.status();
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.key, a.key);
            assert_eq!(b.used, a.used);
        }
        assert_eq!(second.used("a"), Some(3));
        assert_eq!(second.used("b"), Some(2));
    }

    #[test]
    fn unreadable_ledger_does_not_fail_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apikey_stats.json");
        std::fs::write(&path, "garbage").unwrap();
        let pool = CredentialPool::new(Arc::new(FileLedger::new(&path)), PoolConfig::default());
        pool.load_from_source(["a"]).unwrap();
        assert_eq!(pool.used("a"), Some(0));
    }

    #[test]
    fn concurrent_selection_counts_every_use() {
        let (pool, _) = pool_with_limit(1_000);
        let pool = Arc::new(pool);
        pool.load_from_source(["a", "b", "c", "d"]).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        pool.next_credential().unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(pool.total_used(), 800);
        assert!(pool.status().iter().all(|s| s.used == 200));
    }
}
