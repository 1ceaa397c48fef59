//! `chainbalance keys`: API key usage status and pruning.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use chainbalance_core::ingest;
use chainbalance_core::ledger::FileLedger;
use chainbalance_core::{CredentialPool, PoolConfig, UsageLedger};

/// Pool backed by the file ledger at `ledger`, or the default location.
pub fn open_pool(ledger: Option<PathBuf>, usage_limit: u64) -> CredentialPool {
    let ledger = ledger
        .map(FileLedger::new)
        .unwrap_or_else(FileLedger::at_default_location);
    info!(location = %ledger.location(), "using usage ledger");
    CredentialPool::new(Arc::new(ledger), PoolConfig { usage_limit })
}

fn load(keys: &Path, ledger: Option<PathBuf>, usage_limit: u64) -> Result<CredentialPool> {
    let credentials = ingest::load_credentials_from_file(keys)?;
    let pool = open_pool(ledger, usage_limit);
    pool.load_from_source(&credentials)
        .with_context(|| format!("no API keys in {}", keys.display()))?;
    Ok(pool)
}

/// Show a key with only its first and last four characters.
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}

pub fn status(keys: &Path, ledger: Option<PathBuf>, usage_limit: u64, as_json: bool) -> Result<()> {
    let pool = load(keys, ledger, usage_limit)?;
    let status = pool.status();

    if as_json {
        let rows: Vec<serde_json::Value> = status
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.display_name,
                    "key": mask(&s.key),
                    "used": s.used,
                    "remaining": s.remaining,
                    "limit": s.usage_limit,
                    "enabled": s.enabled,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Ledger: {}", pool.ledger_location());
    println!("{:<8} {:<16} {:>10} {:>10}", "NAME", "KEY", "USED", "REMAINING");
    for s in &status {
        println!(
            "{:<8} {:<16} {:>10} {:>10}",
            s.display_name,
            mask(&s.key),
            s.used,
            s.remaining
        );
    }
    let used: u64 = status.iter().map(|s| s.used).sum();
    let remaining: u64 = status.iter().map(|s| s.remaining).sum();
    println!("\n{} keys, {used} used, {remaining} remaining", status.len());
    Ok(())
}

pub fn prune(keys: &Path, ledger: Option<PathBuf>, threshold: u64) -> Result<()> {
    let pool = load(keys, ledger, threshold.max(1))?;
    let removed = pool.remove_by_usage_threshold(threshold);
    pool.flush();

    if removed > 0 {
        let mut content = pool.keys().join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        std::fs::write(keys, content)
            .with_context(|| format!("failed to rewrite {}", keys.display()))?;
    }
    println!("removed {removed} key(s) at or above {threshold} uses, {} left", pool.len());
    Ok(())
}
