//! Outer polling loops
//!
//! The watcher owns the node client and drives the monitoring pipeline over
//! time: chain health snapshots on an interval, contract monitoring over a
//! fixed block range, or following the head as new blocks arrive. Every
//! block goes through its own pipeline invocation.

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Phase, Result, RunFailure};
use crate::fetcher::{BlockId, TransactionFetcher};
use crate::monitor::monitor_contract_block;
use crate::policy::Blacklist;
use crate::report::{ChainMetrics, ContractReport};
use crate::rpc::RpcClient;
use crate::types::TxPoolStatus;
use alloy_primitives::Address;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What to monitor for one contract.
pub struct ContractTarget<'a> {
    pub contract: Address,
    /// Raw ABI JSON; the registry is rebuilt from it for every block
    pub abi_json: &'a str,
    pub blacklist: &'a Blacklist,
}

/// Main watcher that polls the node.
pub struct Watcher {
    rpc: RpcClient,
    config: MonitorConfig,
    last_timestamp: Option<u64>,
}

impl Watcher {
    pub fn new(rpc: RpcClient, config: MonitorConfig) -> Self {
        Self {
            rpc,
            config,
            last_timestamp: None,
        }
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Take one chain health snapshot.
    ///
    /// The block interval is measured against the previous snapshot taken by
    /// this watcher.
    pub async fn chain_snapshot(&mut self) -> Result<ChainMetrics> {
        let metrics = collect_chain_metrics(&self.rpc, self.last_timestamp).await?;
        self.last_timestamp = Some(metrics.timestamp);
        Ok(metrics)
    }

    /// Snapshot chain health every poll interval until cancelled.
    ///
    /// Failed polls are logged and retried on the next tick.
    pub async fn watch_chain<F>(&mut self, cancel: &CancellationToken, mut emit: F)
    where
        F: FnMut(&ChainMetrics),
    {
        info!(interval = ?self.config.poll_interval, "Starting chain watch loop");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.chain_snapshot() => match result {
                    Ok(metrics) => emit(&metrics),
                    Err(e) => warn!(error = %e, "Chain poll failed"),
                },
            }

            if !sleep_or_cancel(&self.config, cancel).await {
                break;
            }
        }

        info!("Chain watch loop stopped");
    }

    /// Monitor `target` over blocks `from..=to`, one pipeline run per block.
    ///
    /// Stops at the first failed run. Returns the number of blocks reported.
    pub async fn monitor_range<F>(
        &self,
        target: &ContractTarget<'_>,
        from: u64,
        to: u64,
        cancel: &CancellationToken,
        mut emit: F,
    ) -> std::result::Result<usize, RunFailure>
    where
        F: FnMut(&ContractReport),
    {
        if from > to {
            return Ok(0);
        }

        info!(from, to, contract = %target.contract, "Processing blocks");
        let mut reported = 0;

        for number in from..=to {
            let report = monitor_contract_block(
                &self.rpc,
                &self.config,
                target.abi_json,
                target.blacklist,
                target.contract,
                &BlockId::Number(number),
                cancel,
            )
            .await?;
            emit(&report);
            reported += 1;
        }

        Ok(reported)
    }

    /// Monitor one block given by number or tag.
    pub async fn monitor_block(
        &self,
        target: &ContractTarget<'_>,
        block: &BlockId,
        cancel: &CancellationToken,
    ) -> std::result::Result<ContractReport, RunFailure> {
        monitor_contract_block(
            &self.rpc,
            &self.config,
            target.abi_json,
            target.blacklist,
            target.contract,
            block,
            cancel,
        )
        .await
    }

    /// Follow the chain head, monitoring each new block once, until cancelled.
    ///
    /// Starts at `start`, or at the current head when `None`.
    pub async fn follow_contract<F>(
        &self,
        target: &ContractTarget<'_>,
        start: Option<u64>,
        cancel: &CancellationToken,
        mut emit: F,
    ) -> std::result::Result<(), RunFailure>
    where
        F: FnMut(&ContractReport),
    {
        info!(contract = %target.contract, "Starting contract follow loop");
        let mut next = start;

        loop {
            let head = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                result = self.rpc.block_number() => {
                    result.map_err(|e| RunFailure::new(Phase::Fetch, e))?
                }
            };
            let from = *next.get_or_insert(head);

            if from <= head {
                match self.monitor_range(target, from, head, cancel, &mut emit).await {
                    Ok(_) => next = Some(head + 1),
                    Err(failure) if matches!(failure.error, MonitorError::Cancelled) => {
                        return Ok(())
                    }
                    Err(failure) => return Err(failure),
                }
            } else {
                debug!(head, next = from, "Up to date");
            }

            if !sleep_or_cancel(&self.config, cancel).await {
                return Ok(());
            }
        }
    }
}

/// Wait one poll interval. Returns false if cancelled first.
async fn sleep_or_cancel(config: &MonitorConfig, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(config.poll_interval) => true,
    }
}

/// Query head block, gas price and mempool depth.
///
/// `txpool_status` is not served by every node; an RPC-level refusal there
/// leaves the mempool counts empty instead of failing the snapshot.
pub async fn collect_chain_metrics(
    rpc: &RpcClient,
    previous_timestamp: Option<u64>,
) -> Result<ChainMetrics> {
    let block = rpc.get_block(&BlockId::latest()).await?;
    let gas_price = rpc.gas_price().await?;
    let txpool = optional_txpool(rpc.txpool_status().await)?;

    info!(block = block.number, "Chain snapshot");

    Ok(ChainMetrics {
        block_number: block.number,
        timestamp: block.timestamp,
        gas_limit: block.gas_limit,
        gas_used: block.gas_used,
        size: block.size,
        base_fee_per_gas: block.base_fee_per_gas,
        gas_price,
        pending_transactions: txpool.as_ref().map(|t| t.pending),
        queued_transactions: txpool.as_ref().map(|t| t.queued),
        block_interval: block_interval(previous_timestamp, block.timestamp),
    })
}

fn optional_txpool(result: Result<TxPoolStatus>) -> Result<Option<TxPoolStatus>> {
    match result {
        Ok(status) => Ok(Some(status)),
        Err(e @ MonitorError::Protocol { .. }) | Err(e @ MonitorError::MalformedResponse { .. }) => {
            debug!(error = %e, "txpool_status unavailable");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Seconds between two observed block timestamps.
///
/// `None` on the first observation or when the head has not advanced.
fn block_interval(previous: Option<u64>, current: u64) -> Option<u64> {
    match previous {
        Some(prev) if current > prev => Some(current - prev),
        _ => None,
    }
}
