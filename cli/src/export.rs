//! Result export: CSV and JSON.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chainbalance_batch::QueryResult;

/// Balance column value for addresses without a balance.
const EMPTY_BALANCE: &str = "0.000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
}

impl Format {
    /// `.json` selects JSON; anything else is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn to_csv(results: &[QueryResult]) -> String {
    let mut out = String::from("address,balance,status,error\n");
    for r in results {
        let _ = writeln!(
            out,
            "{},{},{},{}",
            csv_field(&r.address),
            csv_field(r.balance.as_deref().unwrap_or(EMPTY_BALANCE)),
            r.status,
            csv_field(r.error.as_deref().unwrap_or("")),
        );
    }
    out
}

pub fn to_json(results: &[QueryResult]) -> Result<String> {
    serde_json::to_string_pretty(results).context("failed to serialise results")
}

pub fn write(path: &Path, results: &[QueryResult]) -> Result<()> {
    let content = match Format::from_path(path) {
        Format::Csv => to_csv(results),
        Format::Json => to_json(results)?,
    };
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
