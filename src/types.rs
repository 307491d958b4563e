//! Ethereum JSON-RPC types
//!
//! Type definitions for block summaries, transactions, receipts and txpool
//! status as returned by node JSON-RPC endpoints. Quantities arrive as hex
//! strings and are parsed into fixed-width or arbitrary-precision values here.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Deserializer, Serialize};

/// Block fetched with `includeBodies = false`: header fields plus transaction hashes.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockSummary {
    #[serde(rename = "number", deserialize_with = "deserialize_hex_u64")]
    pub number: u64,

    #[serde(rename = "hash", deserialize_with = "deserialize_hex_b256")]
    pub hash: B256,

    /// Unix seconds
    #[serde(rename = "timestamp", deserialize_with = "deserialize_hex_u64")]
    pub timestamp: u64,

    #[serde(rename = "gasLimit", deserialize_with = "deserialize_hex_u64")]
    pub gas_limit: u64,

    #[serde(rename = "gasUsed", deserialize_with = "deserialize_hex_u64")]
    pub gas_used: u64,

    /// Block size in bytes (absent on some dev nodes)
    #[serde(rename = "size", default, deserialize_with = "deserialize_hex_u64_opt")]
    pub size: Option<u64>,

    #[serde(rename = "baseFeePerGas", default, deserialize_with = "deserialize_hex_u256_opt")]
    pub base_fee_per_gas: Option<U256>,

    /// Transaction hashes in block order
    #[serde(rename = "transactions", default, deserialize_with = "deserialize_hex_b256_vec")]
    pub transactions: Vec<B256>,
}

/// Entry of an EIP-2930 access list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessListItem {
    #[serde(rename = "address", deserialize_with = "deserialize_hex_address")]
    pub address: Address,

    #[serde(rename = "storageKeys", default, deserialize_with = "deserialize_hex_b256_vec")]
    pub storage_keys: Vec<B256>,
}

/// Full transaction as returned by `eth_getTransactionByHash`.
///
/// Carries the signature and every signed field so the sender can be
/// recovered locally instead of trusting the node's `from`.
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    #[serde(rename = "hash", deserialize_with = "deserialize_hex_b256")]
    pub hash: B256,

    /// Sender as reported by the node (informational only)
    #[serde(rename = "from", default, deserialize_with = "deserialize_hex_address_opt")]
    pub from: Option<Address>,

    /// Recipient address (None for contract creation)
    #[serde(rename = "to", default, deserialize_with = "deserialize_hex_address_opt")]
    pub to: Option<Address>,

    /// Value transferred in wei
    #[serde(rename = "value", deserialize_with = "deserialize_hex_u256")]
    pub value: U256,

    /// Call data ("0x" for plain transfers)
    #[serde(rename = "input", deserialize_with = "deserialize_hex_bytes")]
    pub input: Vec<u8>,

    #[serde(rename = "nonce", deserialize_with = "deserialize_hex_u64")]
    pub nonce: u64,

    /// Gas limit
    #[serde(rename = "gas", deserialize_with = "deserialize_hex_u256")]
    pub gas: U256,

    #[serde(rename = "gasPrice", default, deserialize_with = "deserialize_hex_u256_opt")]
    pub gas_price: Option<U256>,

    #[serde(rename = "maxFeePerGas", default, deserialize_with = "deserialize_hex_u256_opt")]
    pub max_fee_per_gas: Option<U256>,

    #[serde(rename = "maxPriorityFeePerGas", default, deserialize_with = "deserialize_hex_u256_opt")]
    pub max_priority_fee_per_gas: Option<U256>,

    /// Envelope type: 0 legacy, 1 EIP-2930, 2 EIP-1559 (missing on old nodes)
    #[serde(rename = "type", default, deserialize_with = "deserialize_hex_u64_opt")]
    pub tx_type: Option<u64>,

    #[serde(rename = "chainId", default, deserialize_with = "deserialize_hex_u64_opt")]
    pub chain_id: Option<u64>,

    #[serde(rename = "accessList", default)]
    pub access_list: Option<Vec<AccessListItem>>,

    #[serde(rename = "v", deserialize_with = "deserialize_hex_u256")]
    pub v: U256,

    #[serde(rename = "r", deserialize_with = "deserialize_hex_u256")]
    pub r: U256,

    #[serde(rename = "s", deserialize_with = "deserialize_hex_u256")]
    pub s: U256,

    #[serde(rename = "yParity", default, deserialize_with = "deserialize_hex_u64_opt")]
    pub y_parity: Option<u64>,
}

impl Transaction {
    /// Envelope type, defaulting to legacy when the node omits it.
    pub fn envelope_type(&self) -> u64 {
        self.tx_type.unwrap_or(0)
    }

    /// Check if this is a contract creation transaction (to is None).
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// Check if this transaction is addressed to `contract`.
    ///
    /// Addresses are compared as bytes, so hex casing never matters.
    pub fn is_addressed_to(&self, contract: Address) -> bool {
        self.to == Some(contract)
    }
}

/// Log entry emitted by a contract during transaction execution.
#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    #[serde(rename = "address", deserialize_with = "deserialize_hex_address")]
    pub address: Address,

    /// Indexed topics (topic0 = event signature hash unless anonymous)
    #[serde(rename = "topics", default, deserialize_with = "deserialize_hex_b256_vec")]
    pub topics: Vec<B256>,

    #[serde(rename = "data", deserialize_with = "deserialize_hex_bytes")]
    pub data: Vec<u8>,
}

/// Outcome of a processed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Failure,
    /// Pre-Byzantium receipts carry a state root instead of a status.
    Unknown,
}

/// Transaction receipt.
#[derive(Debug, Clone, Deserialize)]
pub struct Receipt {
    #[serde(rename = "transactionHash", deserialize_with = "deserialize_hex_b256")]
    pub transaction_hash: B256,

    /// 1 = success, 0 = failure
    #[serde(rename = "status", default, deserialize_with = "deserialize_hex_u64_opt")]
    pub status: Option<u64>,

    #[serde(rename = "gasUsed", deserialize_with = "deserialize_hex_u256")]
    pub gas_used: U256,

    /// Logs emitted during execution (empty for reverted txs)
    #[serde(rename = "logs", default)]
    pub logs: Vec<Log>,
}

impl Receipt {
    pub fn status(&self) -> ReceiptStatus {
        match self.status {
            Some(1) => ReceiptStatus::Success,
            Some(0) => ReceiptStatus::Failure,
            _ => ReceiptStatus::Unknown,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == ReceiptStatus::Success
    }
}

/// Result of `txpool_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TxPoolStatus {
    #[serde(rename = "pending", deserialize_with = "deserialize_hex_u64")]
    pub pending: u64,

    #[serde(rename = "queued", deserialize_with = "deserialize_hex_u64")]
    pub queued: u64,
}

// Hex deserialization helpers

/// Pad an odd-length hex string with a leading zero.
/// This handles cases where RPC returns hex strings without leading zeros.
pub(crate) fn pad_hex_string(s: &str) -> String {
    if s.is_empty() {
        return s.to_string();
    }
    if s.len() % 2 == 1 {
        format!("0{}", s)
    } else {
        s.to_string()
    }
}

/// Parse a hex quantity (`0x1a`) into u64.
pub(crate) fn parse_hex_u64(s: &str) -> Result<u64, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Err(format!("empty hex quantity: {:?}", s));
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid hex quantity {:?}: {}", s, e))
}

/// Parse a hex quantity into U256. Empty quantities are zero.
pub(crate) fn parse_hex_u256(s: &str) -> Result<U256, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    if digits.len() > 64 {
        return Err(format!("hex quantity exceeds 32 bytes: {:?}", s));
    }
    let padded = pad_hex_string(digits);
    let bytes = hex::decode(&padded).map_err(|e| e.to_string())?;
    Ok(U256::from_be_slice(&bytes))
}

fn parse_b256(s: &str) -> Result<B256, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let s = pad_hex_string(s);
    let bytes = hex::decode(&s).map_err(|e| e.to_string())?;
    if bytes.len() != 32 {
        return Err(format!("Expected 32 bytes for hash, got {}", bytes.len()));
    }
    Ok(B256::from_slice(&bytes))
}

fn parse_address_bytes(s: &str) -> Result<Address, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let s = pad_hex_string(s);
    let bytes = hex::decode(&s).map_err(|e| e.to_string())?;
    if bytes.len() != 20 {
        return Err(format!("Expected 20 bytes for address, got {}", bytes.len()));
    }
    Ok(Address::from_slice(&bytes))
}

fn deserialize_hex_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_hex_u64(&s).map_err(serde::de::Error::custom)
}

fn deserialize_hex_u64_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => parse_hex_u64(&s).map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn deserialize_hex_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_hex_u256(&s).map_err(serde::de::Error::custom)
}

fn deserialize_hex_u256_opt<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => parse_hex_u256(&s).map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn deserialize_hex_b256<'de, D>(deserializer: D) -> Result<B256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_b256(&s).map_err(serde::de::Error::custom)
}

fn deserialize_hex_b256_vec<'de, D>(deserializer: D) -> Result<Vec<B256>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Vec::<String>::deserialize(deserializer)?;
    items
        .iter()
        .map(|s| parse_b256(s))
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)
}

fn deserialize_hex_address<'de, D>(deserializer: D) -> Result<Address, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_address_bytes(&s).map_err(serde::de::Error::custom)
}

fn deserialize_hex_address_opt<'de, D>(deserializer: D) -> Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if s.strip_prefix("0x").unwrap_or(&s).is_empty() => Ok(None),
        Some(s) => parse_address_bytes(&s).map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn deserialize_hex_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.strip_prefix("0x").unwrap_or(&s);
    if s.is_empty() {
        Ok(Vec::new())
    } else {
        let s = pad_hex_string(s);
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
