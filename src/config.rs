//! Run configuration and input file loading
//!
//! `MonitorConfig` is built once by the binary and handed to every component
//! by reference. Nothing below reads the process environment.

use crate::policy::{Blacklist, BlacklistEntry};
use crate::types::pad_hex_string;
use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default explorer endpoint (Etherscan-compatible `module=contract&action=getabi`).
pub const DEFAULT_EXPLORER_URL: &str = "https://api.etherscan.io/api";

/// Default value threshold in wei.
pub const DEFAULT_VALUE_LIMIT_WEI: u64 = 10_000_000_000;

/// Settings shared by the whole monitoring run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Node JSON-RPC endpoint
    pub node_url: String,
    /// Block explorer API endpoint
    pub explorer_url: String,
    /// Explorer API key; only needed when the ABI is fetched from the explorer
    pub explorer_api_key: Option<String>,
    /// Chain id used for sender recovery. Queried from the node when `None`.
    pub chain_id: Option<u64>,
    /// Transactions with a value strictly above this are flagged
    pub value_limit: U256,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
    /// Maximum transactions fetched and decoded at once
    pub concurrency: usize,
    /// Drop blacklist flags after the first hit in block order
    pub stop_on_first_blacklist_hit: bool,
    /// Interval between polls of the outer watch loop
    pub poll_interval: Duration,
}

impl MonitorConfig {
    /// Configuration with defaults for everything but the node URL.
    pub fn new(node_url: impl Into<String>) -> Self {
        Self {
            node_url: node_url.into(),
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
            explorer_api_key: None,
            chain_id: None,
            value_limit: U256::from(DEFAULT_VALUE_LIMIT_WEI),
            request_timeout: Duration::from_secs(10),
            concurrency: 8,
            stop_on_first_blacklist_hit: false,
            poll_interval: Duration::from_secs(15),
        }
    }

    /// Worker pool size, never zero.
    pub fn worker_count(&self) -> usize {
        self.concurrency.max(1)
    }
}

/// Load the blacklist document: a JSON array of `{address, comment, date}`.
///
/// Every address must parse; the first bad entry fails the load.
pub fn load_blacklist(path: &Path) -> Result<Blacklist> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read blacklist file: {:?}", path))?;
    parse_blacklist(&contents).with_context(|| format!("Invalid blacklist file: {:?}", path))
}

/// Parse blacklist JSON already read into memory.
pub fn parse_blacklist(contents: &str) -> Result<Blacklist> {
    let entries: Vec<BlacklistEntry> =
        serde_json::from_str(contents).context("Blacklist is not a JSON array of entries")?;
    Blacklist::from_entries(entries)
}

/// Read an ABI description file into a string.
pub fn load_abi_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read ABI file: {:?}", path))
}

/// Parse an address from a hex string.
///
/// Accepts addresses with or without 0x prefix, in any letter case.
pub fn parse_address(s: &str) -> Result<Address> {
    let s = s.trim();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let s = pad_hex_string(s);
    let bytes = hex::decode(&s).with_context(|| format!("Invalid hex address: {}", s))?;

    if bytes.len() != 20 {
        anyhow::bail!("Address must be 20 bytes (40 hex chars), got {} bytes", bytes.len());
    }

    Ok(Address::from_slice(&bytes))
}

/// Parse a wei amount given in decimal, or in hex with a 0x prefix.
pub fn parse_wei(s: &str) -> Result<U256> {
    let s = s.trim();
    let value = match s.strip_prefix("0x") {
        Some(digits) => U256::from_str_radix(digits, 16),
        None => U256::from_str_radix(s, 10),
    };
    value.map_err(|e| anyhow::anyhow!("Invalid wei amount {:?}: {}", s, e))
}
