//! `chainbalance query`: run a balance batch from an address file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chainbalance_batch::{BatchState, OrchestratorConfig, QueryOrchestrator};
use chainbalance_core::ingest;
use chainbalance_core::policy::RateLimiterConfig;
use chainbalance_core::pool::DEFAULT_USAGE_LIMIT;
use chainbalance_core::{AddressFormat, ClientConfig};
use chainbalance_http::endpoints::call_url_for;
use chainbalance_http::{HttpTransport, HttpTransportConfig, Network};

use crate::{cmd_keys, export};

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Address file (TXT or CSV, any column)
    #[arg(short, long)]
    pub input: PathBuf,

    /// File with one API key per line
    #[arg(short, long)]
    pub keys: Option<PathBuf>,

    /// Single API key, added to the --keys list
    #[arg(long, env = "CHAINBALANCE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// TronGrid network
    #[arg(long, default_value = "mainnet")]
    pub network: Network,

    /// Custom node URL (overrides --network)
    #[arg(long)]
    pub node_url: Option<String>,

    /// Concurrent workers (1-50)
    #[arg(short, long, default_value_t = 1)]
    pub concurrency: usize,

    /// Requests per second per API key
    #[arg(long, default_value_t = 12)]
    pub rate: u32,

    /// Per-key usage limit
    #[arg(long, default_value_t = DEFAULT_USAGE_LIMIT)]
    pub usage_limit: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Send hex-encoded addresses instead of Base58
    #[arg(long)]
    pub hex_addresses: bool,

    /// Export results here (.json for JSON, otherwise CSV); stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Usage ledger path (default: next to the executable)
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// On interrupt, write the addresses still to query here
    #[arg(long)]
    pub remaining: Option<PathBuf>,
}

pub async fn run(args: QueryArgs) -> Result<()> {
    let addresses = ingest::load_addresses_from_file(&args.input)
        .with_context(|| format!("failed to load addresses from {}", args.input.display()))?;

    let mut credentials = match &args.keys {
        Some(path) => ingest::load_credentials_from_file(path)?,
        None => Vec::new(),
    };
    if let Some(key) = args.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        if !credentials.iter().any(|c| c == key) {
            credentials.push(key.to_string());
        }
    }

    let pool = cmd_keys::open_pool(args.ledger.clone(), args.usage_limit);
    match &args.keys {
        Some(path) => {
            pool.load_from_source(&credentials)
                .with_context(|| format!("no API keys in {}", path.display()))?;
        }
        None if credentials.is_empty() => {
            warn!("no API credentials supplied; pass --keys or set CHAINBALANCE_API_KEY");
        }
        None => pool.load_from_source(&credentials)?,
    }
    let pool = Arc::new(pool);

    let url = match &args.node_url {
        Some(node) => call_url_for(node),
        None => args.network.call_url(),
    };
    let transport = HttpTransport::new(
        url.clone(),
        HttpTransportConfig {
            request_timeout: Duration::from_secs(args.timeout),
            ..HttpTransportConfig::default()
        },
    )?;

    let config = OrchestratorConfig {
        client: ClientConfig {
            rate_limiter: RateLimiterConfig {
                rate: args.rate,
                ..RateLimiterConfig::default()
            },
            address_format: if args.hex_addresses {
                AddressFormat::Hex
            } else {
                AddressFormat::Visible
            },
            ..ClientConfig::default()
        },
    };
    let orch = QueryOrchestrator::new(pool.clone(), Arc::new(transport), config);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\ninterrupted, letting in-flight queries finish...");
                cancel.cancel();
            }
        })
    };

    info!(url = %url, addresses = addresses.len(), "querying balances");
    let stats = orch
        .run_with_token(addresses, args.concurrency, cancel, |done, total| {
            eprint!("\r[{done}/{total}] queried");
            if done == total {
                eprintln!();
            }
        })
        .await?;
    interrupt.abort();

    let results = orch.results();
    match &args.output {
        Some(path) => {
            export::write(path, &results)?;
            eprintln!("results written to {}", path.display());
        }
        None => print!("{}", export::to_csv(&results)),
    }

    eprintln!("{stats}");
    for s in pool.status() {
        eprintln!("  {}: {} used, {} remaining", s.display_name, s.used, s.remaining);
    }

    if orch.state() == BatchState::Cancelled {
        if let Some(idx) = orch.first_unprocessed() {
            let remaining = orch.remaining_addresses();
            eprintln!(
                "batch cancelled: resume from address #{} ({} left)",
                idx + 1,
                remaining.len()
            );
            if let Some(path) = &args.remaining {
                std::fs::write(path, remaining.join("\n") + "\n")
                    .with_context(|| format!("failed to write {}", path.display()))?;
                eprintln!("remaining addresses written to {}", path.display());
            }
        }
    }
    Ok(())
}
