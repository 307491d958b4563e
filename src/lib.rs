//! chainwatch - Ethereum chain and smart contract monitoring
//!
//! This library decodes the calls and events a contract receives in a block
//! against its ABI, counts them per method and event, and screens each
//! transaction against a value threshold and a sender blacklist. A watcher
//! polls the node to run that pipeline block by block and to report chain
//! health metrics.

pub mod abi;
pub mod aggregate;
pub mod cli;
pub mod config;
pub mod decoder;
pub mod error;
pub mod explorer;
pub mod fetcher;
pub mod monitor;
pub mod policy;
pub mod report;
pub mod rpc;
pub mod signer;
pub mod types;
pub mod watcher;

// Re-export the main types for convenience
pub use abi::AbiRegistry;
pub use config::MonitorConfig;
pub use error::{DecodeMiss, MonitorError, Phase, RunFailure};
pub use fetcher::{BlockId, TransactionFetcher};
pub use monitor::{monitor_contract_block, ContractMonitor};
pub use policy::{Blacklist, PolicyFlag};
pub use report::{ChainMetrics, ContractReport};
pub use rpc::RpcClient;
pub use watcher::Watcher;
