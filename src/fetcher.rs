//! Transaction fetching seam
//!
//! The pipeline talks to the chain only through `TransactionFetcher`. The
//! JSON-RPC client implements it for real nodes; tests plug in fixtures.

use crate::error::{MonitorError, Result};
use crate::types::{BlockSummary, Receipt, Transaction};
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Block selector accepted by `eth_getBlockByNumber`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockId {
    Number(u64),
    /// `latest`, `earliest`, `pending`, `safe` or `finalized`
    Tag(String),
}

impl BlockId {
    pub fn latest() -> Self {
        BlockId::Tag("latest".to_string())
    }

    /// JSON-RPC parameter form (`0xb`, `latest`).
    pub fn to_param(&self) -> String {
        match self {
            BlockId::Number(n) => format!("0x{:x}", n),
            BlockId::Tag(tag) => tag.clone(),
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Number(n) => write!(f, "{}", n),
            BlockId::Tag(tag) => f.write_str(tag),
        }
    }
}

impl FromStr for BlockId {
    type Err = String;

    /// Accepts a tag, a decimal number, or a 0x-prefixed hex number.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "latest" | "earliest" | "pending" | "safe" | "finalized" => {
                return Ok(BlockId::Tag(s.to_string()))
            }
            _ => {}
        }
        let number = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => s.parse::<u64>(),
        };
        number
            .map(BlockId::Number)
            .map_err(|_| format!("invalid block identifier: {:?}", s))
    }
}

/// Chain data needed by one monitoring run.
#[async_trait]
pub trait TransactionFetcher: Send + Sync {
    /// Block header plus transaction hashes (bodies not included).
    ///
    /// Fails with `BlockNotFound` when the node has no such block.
    async fn get_block(&self, block: &BlockId) -> Result<BlockSummary>;

    /// Fails with `TransactionNotFound` when the node no longer has it.
    async fn get_transaction(&self, hash: B256) -> Result<Transaction>;

    /// Fails with `TransactionNotFound` when no receipt exists.
    async fn get_receipt(&self, hash: B256) -> Result<Receipt>;

    /// Chain id reported by the node.
    async fn chain_id(&self) -> Result<u64>;

    /// Hashes of the transactions in `block`, in block order.
    async fn list_transaction_hashes(&self, block: &BlockId) -> Result<Vec<B256>> {
        Ok(self.get_block(block).await?.transactions)
    }
}

/// A transaction belongs to the target contract iff it is sent to it directly.
///
/// Proxies and delegate calls are not followed.
pub fn belongs_to_contract(tx: &Transaction, contract: Address) -> bool {
    tx.is_addressed_to(contract)
}

/// Map a JSON-RPC `null` result for a hash lookup to `TransactionNotFound`.
pub(crate) fn require_found<T>(value: Option<T>, hash: B256) -> Result<T> {
    value.ok_or(MonitorError::TransactionNotFound(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::tests::unsigned_tx;
    use alloy_primitives::address;

    #[test]
    fn test_block_id_parsing() {
        assert_eq!("0xB".parse::<BlockId>().unwrap(), BlockId::Number(11));
        assert_eq!("11".parse::<BlockId>().unwrap(), BlockId::Number(11));
        assert_eq!("latest".parse::<BlockId>().unwrap(), BlockId::latest());
        assert!("tomorrow".parse::<BlockId>().is_err());
    }

    #[test]
    fn test_block_id_param() {
        assert_eq!(BlockId::Number(11).to_param(), "0xb");
        assert_eq!(BlockId::Tag("finalized".into()).to_param(), "finalized");
    }

    #[test]
    fn test_contract_filter() {
        let contract = address!("2279b7a0a67db372996a5fab50d91eaa73d2ebe6");
        let mut tx = unsigned_tx(2, 1);
        assert!(belongs_to_contract(&tx, contract));

        tx.to = Some(address!("0000000000000000000000000000000000000001"));
        assert!(!belongs_to_contract(&tx, contract));

        tx.to = None;
        assert!(!belongs_to_contract(&tx, contract));
    }

    #[test]
    fn test_require_found() {
        assert!(matches!(
            require_found::<u8>(None, B256::ZERO),
            Err(MonitorError::TransactionNotFound(_))
        ));
        assert_eq!(require_found(Some(3), B256::ZERO).unwrap(), 3);
    }
}
