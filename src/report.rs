//! Report types and rendering
//!
//! Pure presentation: nothing here decides anything, it only lays out what
//! the pipeline and the watcher collected.

use crate::aggregate::Counter;
use crate::error::Phase;
use crate::policy::{FlagReason, PolicyFlag};
use crate::types::ReceiptStatus;
use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use std::fmt::Write as _;

/// One transaction addressed to the monitored contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxOutcome {
    pub hash: B256,
    pub value: U256,
    /// Decoded method name, `None` on a decode miss
    pub method: Option<String>,
    pub status: ReceiptStatus,
    pub log_count: usize,
}

/// A call or log that did not resolve against the ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissRecord {
    pub hash: B256,
    pub reason: String,
}

/// A transaction whose processing failed without aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTransaction {
    pub hash: B256,
    pub phase: Phase,
    pub error: String,
}

/// Result of monitoring one contract over one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractReport {
    pub contract: Address,
    pub block_number: u64,
    pub block_hash: B256,
    /// `None` when no sender screening was needed and none was configured
    pub chain_id: Option<u64>,
    pub transactions_scanned: usize,
    pub transactions: Vec<TxOutcome>,
    pub successful: usize,
    pub failed: usize,
    pub methods: Counter,
    pub events: Counter,
    pub misses: Vec<MissRecord>,
    pub flags: Vec<PolicyFlag>,
    pub failed_transactions: Vec<FailedTransaction>,
    /// False when the run stopped early and this is a partial result
    pub complete: bool,
}

/// Chain health snapshot taken by the watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainMetrics {
    pub block_number: u64,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub size: Option<u64>,
    pub base_fee_per_gas: Option<U256>,
    pub gas_price: U256,
    /// `None` when the node does not expose `txpool_status`
    pub pending_transactions: Option<u64>,
    pub queued_transactions: Option<u64>,
    /// Seconds since the previously observed block, if any
    pub block_interval: Option<u64>,
}

impl ChainMetrics {
    /// Gas used as a percentage of the gas limit.
    pub fn gas_utilization(&self) -> f64 {
        if self.gas_limit == 0 {
            return 0.0;
        }
        self.gas_used as f64 * 100.0 / self.gas_limit as f64
    }
}

/// Pretty JSON for any report type.
pub fn render_json<T: Serialize>(report: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

fn render_counter(out: &mut String, title: &str, counter: &Counter) {
    let _ = writeln!(out, "{} ({} total)", title, counter.total());
    if counter.is_empty() {
        let _ = writeln!(out, "  (none declared)");
    }
    for (name, count) in counter.iter() {
        let _ = writeln!(out, "  {:<32} {}", name, count);
    }
}

/// Human-readable contract report.
pub fn render_contract_text(report: &ContractReport) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "Contract {} @ block {} (0x{:x})",
        report.contract.to_checksum(None),
        report.block_number,
        report.block_hash
    );
    match report.chain_id {
        Some(id) => {
            let _ = writeln!(out, ", chain {}", id);
        }
        None => out.push('\n'),
    }
    if !report.complete {
        let _ = writeln!(out, "PARTIAL RESULT: run stopped before all transactions were processed");
    }
    let _ = writeln!(
        out,
        "Scanned {} transactions, {} to contract ({} succeeded, {} failed)",
        report.transactions_scanned,
        report.transactions.len(),
        report.successful,
        report.failed
    );
    out.push('\n');

    render_counter(&mut out, "Methods", &report.methods);
    out.push('\n');
    render_counter(&mut out, "Events", &report.events);

    if !report.transactions.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "Transactions");
        for tx in &report.transactions {
            let status = match tx.status {
                ReceiptStatus::Success => "ok",
                ReceiptStatus::Failure => "reverted",
                ReceiptStatus::Unknown => "unknown",
            };
            let _ = writeln!(
                out,
                "  0x{:x} {:<8} {:<24} value={} wei logs={}",
                tx.hash,
                status,
                tx.method.as_deref().unwrap_or("<unknown>"),
                tx.value,
                tx.log_count
            );
        }
    }

    if !report.flags.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "Alerts");
        for flag in &report.flags {
            let label = match flag.reason {
                FlagReason::ValueExceeded => "VALUE",
                FlagReason::BlacklistedSender => "BLACKLIST",
            };
            let _ = writeln!(out, "  [{}] 0x{:x}: {}", label, flag.transaction_hash, flag.detail);
        }
    }

    if !report.misses.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "Decode misses: {}", report.misses.len());
        for miss in &report.misses {
            let _ = writeln!(out, "  0x{:x}: {}", miss.hash, miss.reason);
        }
    }

    if !report.failed_transactions.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "Failed transactions: {}", report.failed_transactions.len());
        for failed in &report.failed_transactions {
            let _ = writeln!(out, "  0x{:x} ({}): {}", failed.hash, failed.phase, failed.error);
        }
    }

    out
}

/// Human-readable chain health snapshot.
pub fn render_metrics_text(metrics: &ChainMetrics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Block height      {}", metrics.block_number);
    let _ = writeln!(out, "Timestamp         {}", metrics.timestamp);
    if let Some(interval) = metrics.block_interval {
        let _ = writeln!(out, "Block interval    {}s", interval);
    }
    let _ = writeln!(
        out,
        "Gas used / limit  {} / {} ({:.1}%)",
        metrics.gas_used,
        metrics.gas_limit,
        metrics.gas_utilization()
    );
    if let Some(size) = metrics.size {
        let _ = writeln!(out, "Block size        {} bytes", size);
    }
    if let Some(base_fee) = metrics.base_fee_per_gas {
        let _ = writeln!(out, "Base fee          {} wei", base_fee);
    }
    let _ = writeln!(out, "Gas price         {} wei", metrics.gas_price);
    match (metrics.pending_transactions, metrics.queued_transactions) {
        (Some(pending), Some(queued)) => {
            let _ = writeln!(out, "Mempool           {} pending, {} queued", pending, queued);
        }
        _ => {
            let _ = writeln!(out, "Mempool           unavailable");
        }
    }
    out
}
