//! CLI implementation for chainwatch
//!
//! Parses the command line (node and explorer settings may also come from the
//! environment), builds the run configuration once and dispatches to the
//! watcher. Reports print as text, or as pretty JSON with `--json`.

use crate::abi::AbiRegistry;
use crate::config::{
    load_abi_file, load_blacklist, parse_address, parse_wei, MonitorConfig, DEFAULT_EXPLORER_URL,
};
use crate::error::RunFailure;
use crate::explorer::ExplorerClient;
use crate::fetcher::BlockId;
use crate::policy::Blacklist;
use crate::report::{render_contract_text, render_json, render_metrics_text, ChainMetrics, ContractReport};
use crate::rpc::RpcClient;
use crate::watcher::{ContractTarget, Watcher};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Chain health and smart contract monitor
#[derive(Parser)]
#[command(name = "chainwatch")]
#[command(about = "Monitor chain health and smart contract activity")]
pub struct Cli {
    /// Node JSON-RPC endpoint
    #[arg(long, env = "NODE_URL")]
    node_url: String,

    /// Etherscan-compatible explorer API endpoint
    #[arg(long, env = "EXPLORER_URL", default_value = DEFAULT_EXPLORER_URL)]
    explorer_url: String,

    /// Explorer API key (needed for ABI lookups)
    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    explorer_api_key: Option<String>,

    /// Chain id for sender recovery (asked from the node when omitted)
    #[arg(long, env = "CHAIN_ID")]
    chain_id: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Transactions processed concurrently per block
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Seconds between polls in watch and follow modes
    #[arg(long, default_value_t = 15)]
    interval_secs: u64,

    /// Print pretty JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report calls, events, values and policy alerts for one contract
    Contract(ContractArgs),
    /// Report chain health (head, gas, mempool)
    Chain {
        /// Take a single snapshot and exit
        #[arg(long)]
        once: bool,
    },
    /// Fetch and print the verified ABI of a contract
    Abi {
        /// Contract address (hex, with or without 0x prefix)
        #[arg(long)]
        address: String,
    },
}

#[derive(Args)]
pub struct ContractArgs {
    /// Contract address (hex, with or without 0x prefix)
    #[arg(long)]
    address: String,

    /// Block number (decimal or 0x hex) or tag
    #[arg(long, default_value = "latest")]
    block: String,

    /// Last block of an inclusive range starting at --block
    #[arg(long, conflicts_with = "follow")]
    to_block: Option<u64>,

    /// Keep monitoring new blocks as they arrive
    #[arg(long)]
    follow: bool,

    /// Path to the contract ABI JSON
    #[arg(long, required_unless_present = "fetch_abi", conflicts_with = "fetch_abi")]
    abi: Option<PathBuf>,

    /// Fetch the ABI from the explorer instead of a file
    #[arg(long)]
    fetch_abi: bool,

    /// Path to the blacklist JSON (array of {address, comment, date})
    #[arg(long)]
    blacklist: Option<PathBuf>,

    /// Flag transactions whose value exceeds this many wei (decimal or 0x hex)
    #[arg(long)]
    value_limit: Option<String>,

    /// Report only the first blacklisted sender in each block
    #[arg(long)]
    stop_on_first_blacklist_hit: bool,
}

impl Cli {
    fn monitor_config(&self) -> MonitorConfig {
        let mut config = MonitorConfig::new(self.node_url.clone());
        config.explorer_url = self.explorer_url.clone();
        config.explorer_api_key = self.explorer_api_key.clone();
        config.chain_id = self.chain_id;
        config.request_timeout = Duration::from_secs(self.timeout_secs);
        config.concurrency = self.concurrency;
        config.poll_interval = Duration::from_secs(self.interval_secs);
        config
    }
}

/// Parse the command line and run the selected command.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = cli.monitor_config();
    let json = cli.json;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down gracefully...");
                cancel.cancel();
            }
        }
    });

    match cli.command {
        Commands::Contract(args) => {
            if let Some(limit) = &args.value_limit {
                config.value_limit = parse_wei(limit)?;
            }
            config.stop_on_first_blacklist_hit = args.stop_on_first_blacklist_hit;
            run_contract(config, &args, json, &cancel).await
        }
        Commands::Chain { once } => run_chain(config, once, json, &cancel).await,
        Commands::Abi { address } => {
            let address = parse_address(&address)?;
            let abi = fetch_abi(&config, address).await?;
            print_abi(&abi, json)
        }
    }
}

async fn run_contract(
    config: MonitorConfig,
    args: &ContractArgs,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let contract = parse_address(&args.address)?;
    let block: BlockId = args.block.parse().map_err(anyhow::Error::msg)?;

    let abi_json = match &args.abi {
        Some(path) => load_abi_file(path)?,
        None => fetch_abi(&config, contract).await?,
    };
    // Fail on a bad ABI before touching the node
    AbiRegistry::build(&abi_json).context("Invalid contract ABI")?;

    let blacklist = match &args.blacklist {
        Some(path) => load_blacklist(path)?,
        None => Blacklist::default(),
    };
    info!(
        contract = %contract,
        blacklisted = blacklist.len(),
        value_limit = %config.value_limit,
        "Monitoring contract"
    );

    let rpc = RpcClient::new(config.node_url.clone(), config.request_timeout)
        .context("Failed to create RPC client")?;
    let watcher = Watcher::new(rpc, config);
    let target = ContractTarget {
        contract,
        abi_json: &abi_json,
        blacklist: &blacklist,
    };
    let emit = |report: &ContractReport| print_contract(report, json);

    let outcome = if args.follow {
        let start = match block {
            BlockId::Number(n) => Some(n),
            BlockId::Tag(_) => None,
        };
        watcher.follow_contract(&target, start, cancel, emit).await
    } else if let Some(to) = args.to_block {
        let BlockId::Number(from) = block else {
            anyhow::bail!("--to-block needs a numeric --block, got {}", block);
        };
        watcher
            .monitor_range(&target, from, to, cancel, emit)
            .await
            .map(|count| info!(blocks = count, "Range complete"))
    } else {
        watcher
            .monitor_block(&target, &block, cancel)
            .await
            .map(|report| print_contract(&report, json))
    };

    outcome.map_err(|failure| report_failure(failure, json))
}

async fn run_chain(
    config: MonitorConfig,
    once: bool,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let rpc = RpcClient::new(config.node_url.clone(), config.request_timeout)
        .context("Failed to create RPC client")?;
    let mut watcher = Watcher::new(rpc, config);

    if once {
        let metrics = watcher
            .chain_snapshot()
            .await
            .context("Failed to collect chain metrics")?;
        print_metrics(&metrics, json);
    } else {
        watcher
            .watch_chain(cancel, |metrics| print_metrics(metrics, json))
            .await;
    }

    Ok(())
}

async fn fetch_abi(config: &MonitorConfig, address: Address) -> Result<String> {
    let api_key = config
        .explorer_api_key
        .clone()
        .context("Explorer API key required (--explorer-api-key or ETHERSCAN_API_KEY)")?;
    let explorer = ExplorerClient::new(config.explorer_url.clone(), api_key, config.request_timeout)
        .context("Failed to create explorer client")?;
    explorer
        .get_contract_abi(address)
        .await
        .with_context(|| format!("Failed to fetch ABI for 0x{:x}", address))
}

fn print_abi(abi: &str, json: bool) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(abi).context("Explorer returned an ABI that is not JSON")?;
    println!("{}", serde_json::to_string_pretty(&value)?);

    if !json {
        match AbiRegistry::build(abi) {
            Ok(registry) => eprintln!(
                "{} functions, {} events",
                registry.function_count(),
                registry.event_count()
            ),
            Err(e) => warn!(error = %e, "ABI does not build a registry"),
        }
    }
    Ok(())
}

fn print_contract(report: &ContractReport, json: bool) {
    if json {
        match render_json(report) {
            Ok(out) => println!("{}", out),
            Err(e) => warn!(error = %e, "Failed to serialize report"),
        }
    } else {
        println!("{}", render_contract_text(report));
    }
}

fn print_metrics(metrics: &ChainMetrics, json: bool) {
    if json {
        match render_json(metrics) {
            Ok(out) => println!("{}", out),
            Err(e) => warn!(error = %e, "Failed to serialize metrics"),
        }
    } else {
        println!("{}", render_metrics_text(metrics));
    }
}

/// Print whatever the failed run managed to collect, then hand back the error.
fn report_failure(failure: RunFailure, json: bool) -> anyhow::Error {
    if let Some(partial) = &failure.partial {
        print_contract(partial, json);
    }
    anyhow::Error::new(failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_contract_args() {
        let cli = Cli::try_parse_from([
            "chainwatch",
            "--node-url",
            "http://127.0.0.1:8545",
            "--chain-id",
            "31337",
            "--concurrency",
            "4",
            "contract",
            "--address",
            "0x2279B7A0a67DB372996a5FaB50D91eAA73d2eBe6",
            "--block",
            "0xb",
            "--to-block",
            "20",
            "--abi",
            "token.json",
            "--stop-on-first-blacklist-hit",
        ])
        .unwrap();

        let config = cli.monitor_config();
        assert_eq!(config.chain_id, Some(31337));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(10));

        let Commands::Contract(args) = cli.command else {
            panic!("expected contract command");
        };
        assert_eq!(args.block.parse::<BlockId>().unwrap(), BlockId::Number(11));
        assert_eq!(args.to_block, Some(20));
        assert!(args.stop_on_first_blacklist_hit);
    }

    #[test]
    fn test_contract_needs_an_abi_source() {
        let result = Cli::try_parse_from([
            "chainwatch",
            "--node-url",
            "http://127.0.0.1:8545",
            "contract",
            "--address",
            "0x2279b7a0a67db372996a5fab50d91eaa73d2ebe6",
        ]);
        assert!(result.is_err());

        let both = Cli::try_parse_from([
            "chainwatch",
            "--node-url",
            "http://127.0.0.1:8545",
            "contract",
            "--address",
            "0x2279b7a0a67db372996a5fab50d91eaa73d2ebe6",
            "--abi",
            "token.json",
            "--fetch-abi",
        ]);
        assert!(both.is_err());
    }
}
