//! ChainBalance CLI: batch TRC-20 (USDT) balance queries on TRON.
//!
//! # Commands
//! ```text
//! chainbalance query    --input <file> [--keys <file>] [--output <file.csv|file.json>]
//! chainbalance validate [--input <file>] [ADDRESS]...
//! chainbalance keys status --keys <file>
//! chainbalance keys prune  --keys <file> [--threshold N]
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use chainbalance_core::address;
use chainbalance_core::ingest;
use chainbalance_core::pool::DEFAULT_USAGE_LIMIT;

mod cmd_keys;
mod cmd_query;
mod export;
mod logging;

#[derive(Parser)]
#[command(
    name = "chainbalance",
    about = "Batch USDT balance checker for TRON: ChainBalance CLI",
    long_about = "
ChainBalance CLI: query TRC-20 balances for many TRON addresses through
TronGrid, spreading the load across a pool of API keys.

ENVIRONMENT VARIABLES:
  CHAINBALANCE_API_KEY   API key used when no --keys file is given
  RUST_LOG               Log filter (overrides --verbose)
",
    version
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query balances for every address in a TXT/CSV file
    Query(cmd_query::QueryArgs),

    /// Check addresses for Base58Check validity
    Validate {
        /// File of addresses (TXT or CSV)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Addresses given directly
        addresses: Vec<String>,
    },

    /// API key usage maintenance
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
}

#[derive(Subcommand)]
enum KeysAction {
    /// Show per-key usage
    Status {
        /// File with one API key per line
        #[arg(long)]
        keys: PathBuf,
        /// Usage ledger path (default: next to the executable)
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Per-key usage limit
        #[arg(long, default_value_t = DEFAULT_USAGE_LIMIT)]
        usage_limit: u64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop keys whose usage reached a threshold and rewrite the keys file
    Prune {
        #[arg(long)]
        keys: PathBuf,
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Usage at or above which a key is removed
        #[arg(long, default_value_t = DEFAULT_USAGE_LIMIT)]
        threshold: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Query(args) => cmd_query::run(args).await,

        Commands::Validate { input, addresses } => cmd_validate(input, addresses),

        // Key maintenance blocks on ledger writes.
        Commands::Keys { action } => tokio::task::spawn_blocking(move || match action {
            KeysAction::Status {
                keys,
                ledger,
                usage_limit,
                json,
            } => cmd_keys::status(&keys, ledger, usage_limit, json),
            KeysAction::Prune {
                keys,
                ledger,
                threshold,
            } => cmd_keys::prune(&keys, ledger, threshold),
        })
        .await?,
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

fn cmd_validate(input: Option<PathBuf>, mut addresses: Vec<String>) -> Result<()> {
    if let Some(path) = &input {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        addresses.extend(ingest::split_tokens(&text).map(String::from));
    }
    if addresses.is_empty() {
        bail!("nothing to validate: pass addresses or --input <file>");
    }

    let mut invalid = 0usize;
    for addr in &addresses {
        match address::validate_with_reason(addr) {
            Ok(()) => println!("✓ {addr}"),
            Err(e) => {
                invalid += 1;
                println!("✗ {addr}  ({e})");
            }
        }
    }
    println!(
        "\n{} valid, {} invalid",
        addresses.len() - invalid,
        invalid
    );
    Ok(())
}
