//! Address and credential list loading.
//!
//! Address lists may be plain text or CSV: every token separated by a
//! newline, comma, space, tab or semicolon is considered, and only valid
//! TRON addresses are kept.

use std::collections::HashSet;
use std::path::Path;

use crate::address;
use crate::error::IngestError;

const ADDRESS_SEPARATORS: &[char] = &['\n', '\r', ',', ' ', '\t', ';'];

fn read(path: &Path) -> Result<String, IngestError> {
    std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Candidate tokens in `text`: trimmed, unquoted, non-empty.
pub fn split_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(ADDRESS_SEPARATORS)
        .map(|t| t.trim().trim_matches('"'))
        .filter(|t| !t.is_empty())
}

/// Extract unique valid addresses from `text`, in first-seen order.
pub fn load_addresses_from_text(text: &str) -> Result<Vec<String>, IngestError> {
    let mut seen = HashSet::new();
    let mut skipped = 0usize;
    let mut addresses = Vec::new();

    for token in split_tokens(text) {
        if !address::validate(token) {
            skipped += 1;
            continue;
        }
        if seen.insert(token) {
            addresses.push(token.to_string());
        }
    }

    if addresses.is_empty() {
        return Err(IngestError::NoValidAddresses);
    }
    if skipped > 0 {
        tracing::debug!(skipped, kept = addresses.len(), "ignored tokens that are not TRON addresses");
    }
    Ok(addresses)
}

/// Read a TXT or CSV file and extract its addresses.
pub fn load_addresses_from_file(path: impl AsRef<Path>) -> Result<Vec<String>, IngestError> {
    let path = path.as_ref();
    let addresses = load_addresses_from_text(&read(path)?)?;
    tracing::info!(path = %path.display(), count = addresses.len(), "loaded addresses");
    Ok(addresses)
}

/// One credential per line; blank lines and `#` comments are skipped.
pub fn load_credentials_from_text(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(*line))
        .map(String::from)
        .collect()
}

pub fn load_credentials_from_file(path: impl AsRef<Path>) -> Result<Vec<String>, IngestError> {
    Ok(load_credentials_from_text(&read(path.as_ref())?))
}
