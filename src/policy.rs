//! Value-threshold and sender-blacklist checks
//!
//! Both checks look at one transaction and emit at most one `PolicyFlag`.
//! Flags are reported, never persisted.

use crate::config::parse_address;
use crate::signer::ChainSigner;
use crate::types::Transaction;
use alloy_primitives::{Address, B256, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entry of the blacklist document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub address: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub date: String,
}

/// Read-only set of flagged addresses.
///
/// Keys are parsed 20-byte addresses, so lookups ignore hex letter case.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    entries: HashMap<Address, BlacklistEntry>,
}

impl Blacklist {
    pub fn from_entries(entries: Vec<BlacklistEntry>) -> Result<Self> {
        let mut map = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let address = parse_address(&entry.address)
                .with_context(|| format!("Invalid address in entry {}: {}", index, entry.address))?;
            map.insert(address, entry);
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, address: &Address) -> Option<&BlacklistEntry> {
        self.entries.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.entries.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagReason {
    ValueExceeded,
    BlacklistedSender,
}

/// A transaction that tripped a policy check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyFlag {
    pub transaction_hash: B256,
    pub reason: FlagReason,
    pub detail: String,
}

/// Flag `tx` when its value is strictly greater than `limit`.
pub fn check_value(tx: &Transaction, limit: U256) -> Option<PolicyFlag> {
    if tx.value > limit {
        Some(PolicyFlag {
            transaction_hash: tx.hash,
            reason: FlagReason::ValueExceeded,
            detail: format!("value {} wei exceeds limit {} wei", tx.value, limit),
        })
    } else {
        None
    }
}

/// Flag `tx` when its already-recovered `sender` is blacklisted.
pub fn check_blacklist(
    tx: &Transaction,
    sender: Address,
    blacklist: &Blacklist,
) -> Option<PolicyFlag> {
    blacklist.get(&sender).map(|entry| {
        let mut detail = format!("sender {} is blacklisted", sender.to_checksum(None));
        if !entry.comment.is_empty() {
            detail.push_str(&format!(" ({})", entry.comment));
        }
        if !entry.date.is_empty() {
            detail.push_str(&format!(" since {}", entry.date));
        }
        PolicyFlag {
            transaction_hash: tx.hash,
            reason: FlagReason::BlacklistedSender,
            detail,
        }
    })
}

/// Recover the sender of `tx` and screen it against the blacklist.
///
/// Skips recovery entirely when the blacklist is empty.
pub fn screen_sender(
    tx: &Transaction,
    signer: &ChainSigner,
    blacklist: &Blacklist,
) -> crate::error::Result<Option<PolicyFlag>> {
    if blacklist.is_empty() {
        return Ok(None);
    }
    let sender = signer.recover_sender(tx)?;
    Ok(check_blacklist(tx, sender, blacklist))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::tests::{dev_signing_key, sign, unsigned_tx};
    use alloy_primitives::address;

    fn blacklist_of(addresses: &[&str]) -> Blacklist {
        Blacklist::from_entries(
            addresses
                .iter()
                .map(|a| BlacklistEntry {
                    address: a.to_string(),
                    comment: "test".to_string(),
                    date: "2024-01-01".to_string(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_value_limit_is_strict() {
        let limit = U256::from(10_000_000_000u64);
        let mut tx = unsigned_tx(2, 1);

        tx.value = limit;
        assert!(check_value(&tx, limit).is_none());

        tx.value = limit + U256::from(1);
        let flag = check_value(&tx, limit).unwrap();
        assert_eq!(flag.reason, FlagReason::ValueExceeded);
    }

    #[test]
    fn test_value_limit_beyond_u128() {
        let limit = U256::from(u128::MAX);
        let mut tx = unsigned_tx(2, 1);
        tx.value = limit + U256::from(1);
        assert!(check_value(&tx, limit).is_some());
    }

    #[test]
    fn test_blacklist_ignores_case() {
        let blacklist = blacklist_of(&["0xF39FD6E51AAD88F6F4CE6AB8827279CFFFB92266"]);
        let tx = unsigned_tx(2, 1);
        let sender = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

        let flag = check_blacklist(&tx, sender, &blacklist).unwrap();
        assert_eq!(flag.reason, FlagReason::BlacklistedSender);
        assert!(flag.detail.contains("test"));
    }

    #[test]
    fn test_blacklist_miss() {
        let blacklist = blacklist_of(&["0x70997970c51812dc3a010c7d01b50e0d17dc79c8"]);
        let tx = unsigned_tx(2, 1);
        let sender = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");
        assert!(check_blacklist(&tx, sender, &blacklist).is_none());
    }

    #[test]
    fn test_screen_sender_recovers_signer() {
        let signer = ChainSigner::new(31337);
        let mut tx = unsigned_tx(2, 31337);
        sign(&mut tx, &dev_signing_key(), &signer);

        let blacklist = blacklist_of(&["0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"]);
        let flag = screen_sender(&tx, &signer, &blacklist).unwrap();
        assert!(flag.is_some());

        // Unsigned transactions are never recovered against an empty blacklist
        let unsigned = unsigned_tx(2, 31337);
        assert!(screen_sender(&unsigned, &signer, &Blacklist::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_invalid_entry_rejected() {
        let result = Blacklist::from_entries(vec![BlacklistEntry {
            address: "not-an-address".to_string(),
            comment: String::new(),
            date: String::new(),
        }]);
        assert!(result.is_err());
    }
}
