//! Contract monitoring pipeline
//!
//! One invocation covers one contract and one block:
//!
//! ```text
//!   block ──► tx hashes ──► [fetch tx ─► filter ─► decode call ─► receipt ─► decode logs ─► checks]
//!                              (bounded worker pool, one task per hash)
//!                                              │
//!                                              ▼
//!                              merge in block order ──► ContractReport
//! ```
//!
//! Workers share nothing mutable. Their results are tagged with the block
//! index and folded into the counters by a single writer once collected, so
//! totals and first-hit blacklist behavior do not depend on completion order.
//! Nothing survives between invocations.

use crate::abi::AbiRegistry;
use crate::aggregate::Counter;
use crate::config::MonitorConfig;
use crate::decoder::{decode_call, decode_logs};
use crate::error::{DecodeMiss, MonitorError, Phase, RunFailure};
use crate::fetcher::{belongs_to_contract, BlockId, TransactionFetcher};
use crate::policy::{check_value, screen_sender, Blacklist, PolicyFlag};
use crate::report::{ContractReport, FailedTransaction, MissRecord, TxOutcome};
use crate::signer::ChainSigner;
use crate::types::{BlockSummary, ReceiptStatus};
use alloy_primitives::{Address, B256, U256};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything learned about one transaction addressed to the contract.
struct ContractActivity<'r> {
    value: U256,
    method: Result<&'r str, DecodeMiss>,
    status: ReceiptStatus,
    events: Vec<Result<&'r str, DecodeMiss>>,
    value_flag: Option<PolicyFlag>,
    blacklist_flag: Option<PolicyFlag>,
}

enum Inspection<'r> {
    /// Not sent to the monitored contract
    Unrelated,
    Contract(ContractActivity<'r>),
    Failed(Phase, MonitorError),
}

/// Monitors one contract against a prepared registry and blacklist.
pub struct ContractMonitor<'a, F: TransactionFetcher> {
    fetcher: &'a F,
    registry: &'a AbiRegistry,
    blacklist: &'a Blacklist,
    config: &'a MonitorConfig,
    contract: Address,
}

impl<'a, F: TransactionFetcher> ContractMonitor<'a, F> {
    pub fn new(
        fetcher: &'a F,
        registry: &'a AbiRegistry,
        blacklist: &'a Blacklist,
        config: &'a MonitorConfig,
        contract: Address,
    ) -> Self {
        Self {
            fetcher,
            registry,
            blacklist,
            config,
            contract,
        }
    }

    /// Run the pipeline over one block.
    ///
    /// Per-transaction failures are recorded in the report. Transport errors
    /// and cancellation stop the run and return what was merged so far.
    pub async fn run(
        &self,
        block: &BlockId,
        cancel: &CancellationToken,
    ) -> Result<ContractReport, RunFailure> {
        // Only sender screening needs the chain id
        let chain_id = if self.blacklist.is_empty() {
            self.config.chain_id
        } else {
            Some(self.resolve_chain_id(cancel).await?)
        };
        let signer = chain_id.map(ChainSigner::new);

        let summary = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(RunFailure::new(Phase::Fetch, MonitorError::Cancelled));
            }
            result = self.fetcher.get_block(block) => {
                result.map_err(|e| RunFailure::new(Phase::Fetch, e))?
            }
        };

        info!(
            block = summary.number,
            transactions = summary.transactions.len(),
            contract = %self.contract,
            "Processing block"
        );

        let mut collected: Vec<(usize, B256, Inspection<'a>)> =
            Vec::with_capacity(summary.transactions.len());
        let mut abort: Option<(Phase, MonitorError)> = None;

        {
            let signer = signer.as_ref();
            let mut inspections = stream::iter(summary.transactions.iter().copied().enumerate())
                .map(move |(index, hash)| async move {
                    (index, hash, self.inspect(hash, signer).await)
                })
                .buffer_unordered(self.config.worker_count());

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        abort = Some((Phase::Fetch, MonitorError::Cancelled));
                        break;
                    }
                    next = inspections.next() => match next {
                        Some((_, hash, Inspection::Failed(phase, error))) if error.aborts_run() => {
                            warn!(tx = %hash, error = %error, "Aborting run");
                            abort = Some((phase, error));
                            break;
                        }
                        Some(item) => collected.push(item),
                        None => break,
                    },
                }
            }
        }

        collected.sort_by_key(|(index, _, _)| *index);
        let mut report = self.merge(&summary, chain_id, collected);

        match abort {
            Some((phase, error)) => {
                report.complete = false;
                Err(RunFailure::new(phase, error).with_partial(report))
            }
            None => {
                info!(
                    block = report.block_number,
                    contract_transactions = report.transactions.len(),
                    flags = report.flags.len(),
                    failed = report.failed_transactions.len(),
                    "Completed block"
                );
                Ok(report)
            }
        }
    }

    async fn resolve_chain_id(&self, cancel: &CancellationToken) -> Result<u64, RunFailure> {
        if let Some(id) = self.config.chain_id {
            return Ok(id);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RunFailure::new(Phase::Fetch, MonitorError::Cancelled)),
            result = self.fetcher.chain_id() => {
                let id = result.map_err(|e| RunFailure::new(Phase::Fetch, e))?;
                debug!(chain_id = id, "Chain id from node");
                Ok(id)
            }
        }
    }

    /// Fetch, filter, decode and check one transaction.
    async fn inspect(&self, hash: B256, signer: Option<&ChainSigner>) -> Inspection<'a> {
        let tx = match self.fetcher.get_transaction(hash).await {
            Ok(tx) => tx,
            Err(e) => return Inspection::Failed(Phase::Fetch, e),
        };

        if !belongs_to_contract(&tx, self.contract) {
            return Inspection::Unrelated;
        }

        let method = decode_call(&tx.input, self.registry);

        // Receipts are only fetched for contract transactions
        let receipt = match self.fetcher.get_receipt(hash).await {
            Ok(receipt) => receipt,
            Err(e) => return Inspection::Failed(Phase::Fetch, e),
        };
        let events = decode_logs(&receipt, self.registry);

        let value_flag = check_value(&tx, self.config.value_limit);
        let blacklist_flag = match signer.map(|signer| screen_sender(&tx, signer, self.blacklist)) {
            Some(Ok(flag)) => flag,
            Some(Err(e)) => return Inspection::Failed(Phase::Policy, e),
            None => None,
        };

        Inspection::Contract(ContractActivity {
            value: tx.value,
            method,
            status: receipt.status(),
            events,
            value_flag,
            blacklist_flag,
        })
    }

    /// Fold inspections (already in block order) into a report.
    fn merge(
        &self,
        summary: &BlockSummary,
        chain_id: Option<u64>,
        collected: Vec<(usize, B256, Inspection<'a>)>,
    ) -> ContractReport {
        let mut report = ContractReport {
            contract: self.contract,
            block_number: summary.number,
            block_hash: summary.hash,
            chain_id,
            transactions_scanned: summary.transactions.len(),
            transactions: Vec::new(),
            successful: 0,
            failed: 0,
            methods: Counter::seed(self.registry.declared_names()),
            events: Counter::seed(self.registry.declared_names()),
            misses: Vec::new(),
            flags: Vec::new(),
            failed_transactions: Vec::new(),
            complete: true,
        };
        let mut blacklist_hit = false;

        for (_, hash, inspection) in collected {
            let activity = match inspection {
                Inspection::Unrelated => continue,
                Inspection::Failed(phase, error) => {
                    warn!(tx = %hash, phase = %phase, error = %error, "Transaction skipped");
                    report.failed_transactions.push(FailedTransaction {
                        hash,
                        phase,
                        error: error.to_string(),
                    });
                    continue;
                }
                Inspection::Contract(activity) => activity,
            };

            let method = match activity.method {
                Ok(name) => {
                    report.methods.record(name);
                    Some(name.to_string())
                }
                Err(miss) => {
                    debug!(tx = %hash, %miss, "Call not in ABI");
                    report.misses.push(MissRecord {
                        hash,
                        reason: miss.to_string(),
                    });
                    None
                }
            };

            let log_count = activity.events.len();
            for event in activity.events {
                match event {
                    Ok(name) => {
                        report.events.record(name);
                    }
                    Err(miss) => {
                        debug!(tx = %hash, %miss, "Log not in ABI");
                        report.misses.push(MissRecord {
                            hash,
                            reason: miss.to_string(),
                        });
                    }
                }
            }

            match activity.status {
                ReceiptStatus::Success => report.successful += 1,
                ReceiptStatus::Failure => report.failed += 1,
                ReceiptStatus::Unknown => {}
            }

            if let Some(flag) = activity.value_flag {
                warn!(tx = %hash, detail = %flag.detail, "Value limit exceeded");
                report.flags.push(flag);
            }

            if let Some(flag) = activity.blacklist_flag {
                if blacklist_hit && self.config.stop_on_first_blacklist_hit {
                    debug!(tx = %hash, "Blacklist hit after first, dropped");
                } else {
                    warn!(tx = %hash, detail = %flag.detail, "Blacklisted sender");
                    blacklist_hit = true;
                    report.flags.push(flag);
                }
            }

            report.transactions.push(TxOutcome {
                hash,
                value: activity.value,
                method,
                status: activity.status,
                log_count,
            });
        }

        report
    }
}

/// Build the registry from `abi_json` and run the pipeline over one block.
///
/// Every call starts from scratch: registry, counters and signer are local.
pub async fn monitor_contract_block<F: TransactionFetcher>(
    fetcher: &F,
    config: &MonitorConfig,
    abi_json: &str,
    blacklist: &Blacklist,
    contract: Address,
    block: &BlockId,
    cancel: &CancellationToken,
) -> Result<ContractReport, RunFailure> {
    let registry =
        AbiRegistry::build(abi_json).map_err(|e| RunFailure::new(Phase::RegistryBuild, e))?;
    debug!(
        functions = registry.function_count(),
        events = registry.event_count(),
        "ABI registry built"
    );

    ContractMonitor::new(fetcher, &registry, blacklist, config, contract)
        .run(block, cancel)
        .await
}
