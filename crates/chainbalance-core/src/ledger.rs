//! Credential usage ledger: persists per-key usage counters across runs.
//!
//! The on-disk format is a small JSON document:
//!
//! ```json
//! { "keys": { "<api key>": 1234 } }
//! ```
//!
//! Writes from the pool go through a [`LedgerWriter`], a background thread
//! that coalesces queued snapshots so selection never waits on the disk.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::PersistenceError;

/// Default ledger file name.
pub const LEDGER_FILE_NAME: &str = "apikey_stats.json";

/// Usage counters keyed by credential.
pub type UsageMap = HashMap<String, u64>;

/// Storage for usage counters.
///
/// Implementations include [`FileLedger`] and [`MemoryLedger`].
pub trait UsageLedger: Send + Sync + 'static {
    /// Load all counters. A ledger that does not exist yet loads as empty.
    fn load(&self) -> Result<UsageMap, PersistenceError>;

    /// Overwrite the ledger with `usage`.
    fn save(&self, usage: &UsageMap) -> Result<(), PersistenceError>;

    /// Human-readable location (path or name).
    fn location(&self) -> String;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    keys: BTreeMap<String, u64>,
}

// ─── File ledger ──────────────────────────────────────────────────────────────

/// JSON file ledger, written atomically via a sibling temp file + rename.
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger at [`default_ledger_path`].
    pub fn at_default_location() -> Self {
        Self::new(default_ledger_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UsageLedger for FileLedger {
    fn load(&self) -> Result<UsageMap, PersistenceError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(UsageMap::new()),
            Err(e) => return Err(e.into()),
        };
        let file: LedgerFile = serde_json::from_str(&content)?;
        Ok(file.keys.into_iter().collect())
    }

    fn save(&self, usage: &UsageMap) -> Result<(), PersistenceError> {
        let file = LedgerFile {
            keys: usage.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Resolve the ledger location next to the running executable.
///
/// Falls back to the working directory when the executable lives in a
/// transient location (a cargo `target/` profile dir or the system temp dir).
pub fn default_ledger_path() -> PathBuf {
    let cwd = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let exe_dir = match std::env::current_exe() {
        Ok(exe) => match exe.parent() {
            Some(dir) => dir.to_path_buf(),
            None => return cwd().join(LEDGER_FILE_NAME),
        },
        Err(_) => return cwd().join(LEDGER_FILE_NAME),
    };
    if is_transient_dir(&exe_dir) {
        cwd().join(LEDGER_FILE_NAME)
    } else {
        exe_dir.join(LEDGER_FILE_NAME)
    }
}

fn is_transient_dir(dir: &Path) -> bool {
    if dir.starts_with(std::env::temp_dir()) {
        return true;
    }
    let names: Vec<&str> = dir
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    names.windows(2).any(|w| {
        w[0] == "target" && matches!(w[1], "debug" | "release")
    }) || names.last().is_some_and(|last| *last == "deps")
}

// ─── In-memory ledger ─────────────────────────────────────────────────────────

/// In-memory ledger for tests and ephemeral pools.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    data: Mutex<UsageMap>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_usage(usage: UsageMap) -> Self {
        Self {
            data: Mutex::new(usage),
        }
    }

    pub fn snapshot(&self) -> UsageMap {
        self.data.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl UsageLedger for MemoryLedger {
    fn load(&self) -> Result<UsageMap, PersistenceError> {
        Ok(self.snapshot())
    }

    fn save(&self, usage: &UsageMap) -> Result<(), PersistenceError> {
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = usage.clone();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".into()
    }
}

// ─── Background writer ────────────────────────────────────────────────────────

enum Command {
    Save(UsageMap),
    Flush(oneshot::Sender<()>),
}

/// Best-effort background persistence.
///
/// Snapshots are written in the order they were queued; when several are
/// pending only the newest is written. Failures are logged and dropped.
pub struct LedgerWriter {
    tx: mpsc::UnboundedSender<Command>,
}

impl LedgerWriter {
    pub fn spawn(ledger: Arc<dyn UsageLedger>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Command>();
        let spawned = thread::Builder::new()
            .name("ledger-writer".into())
            .spawn(move || writer_loop(rx, ledger.as_ref()));
        if let Err(e) = spawned {
            // The receiver was dropped with the closure; queued saves become no-ops.
            tracing::warn!(error = %e, "failed to start ledger writer thread");
        }
        Self { tx }
    }

    /// Queue a snapshot for writing. Never blocks.
    pub fn submit(&self, usage: UsageMap) {
        if self.tx.send(Command::Save(usage)).is_err() {
            tracing::warn!("ledger writer is gone, usage snapshot dropped");
        }
    }

    /// Block until every snapshot queued so far has been written (or failed).
    ///
    /// Blocks the calling thread: from async code, run it on
    /// `tokio::task::spawn_blocking`.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.blocking_recv();
        }
    }
}

fn writer_loop(mut rx: mpsc::UnboundedReceiver<Command>, ledger: &dyn UsageLedger) {
    while let Some(first) = rx.blocking_recv() {
        let mut latest = None;
        let mut acks = Vec::new();
        let mut next = Some(first);
        while let Some(cmd) = next {
            match cmd {
                Command::Save(usage) => latest = Some(usage),
                Command::Flush(ack) => acks.push(ack),
            }
            next = rx.try_recv().ok();
        }

        if let Some(usage) = latest {
            if let Err(e) = ledger.save(&usage) {
                tracing::warn!(error = %e, location = %ledger.location(), "failed to persist credential usage");
            }
        }
        for ack in acks {
            let _ = ack.send(());
        }
    }
}
