//! Transaction sender recovery
//!
//! Rebuilds the signing payload of a transaction for the configured chain and
//! recovers the signer's address from its ECDSA signature. Supports legacy
//! (with and without EIP-155 replay protection), EIP-2930 and EIP-1559
//! envelopes.

use crate::error::{MonitorError, Result};
use crate::types::{AccessListItem, Transaction};
use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_rlp::{Encodable, Header, EMPTY_STRING_CODE};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

/// Recovers senders for one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSigner {
    chain_id: u64,
}

impl ChainSigner {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Hash the signer committed to, plus the signature's y-parity.
    pub fn signing_hash(&self, tx: &Transaction) -> Result<(B256, u8)> {
        match tx.envelope_type() {
            0 => self.legacy_signing_hash(tx),
            1 => {
                self.check_chain_id(tx)?;
                let fields = vec![
                    rlp(self.chain_id),
                    rlp(tx.nonce),
                    rlp(required(tx.gas_price, "gasPrice")?),
                    rlp(tx.gas),
                    rlp_to(tx.to),
                    rlp(tx.value),
                    rlp(tx.input.as_slice()),
                    rlp_access_list(tx.access_list.as_deref().unwrap_or_default()),
                ];
                Ok((typed_hash(0x01, &fields), typed_parity(tx)?))
            }
            2 => {
                self.check_chain_id(tx)?;
                let fields = vec![
                    rlp(self.chain_id),
                    rlp(tx.nonce),
                    rlp(required(tx.max_priority_fee_per_gas, "maxPriorityFeePerGas")?),
                    rlp(required(tx.max_fee_per_gas, "maxFeePerGas")?),
                    rlp(tx.gas),
                    rlp_to(tx.to),
                    rlp(tx.value),
                    rlp(tx.input.as_slice()),
                    rlp_access_list(tx.access_list.as_deref().unwrap_or_default()),
                ];
                Ok((typed_hash(0x02, &fields), typed_parity(tx)?))
            }
            other => Err(MonitorError::Signature(format!(
                "unsupported transaction type {}",
                other
            ))),
        }
    }

    fn legacy_signing_hash(&self, tx: &Transaction) -> Result<(B256, u8)> {
        let v: u64 = tx
            .v
            .try_into()
            .map_err(|_| MonitorError::Signature(format!("v out of range: {}", tx.v)))?;

        let mut fields = vec![
            rlp(tx.nonce),
            rlp(required(tx.gas_price, "gasPrice")?),
            rlp(tx.gas),
            rlp_to(tx.to),
            rlp(tx.value),
            rlp(tx.input.as_slice()),
        ];

        let parity = match v {
            // Pre-EIP-155: no chain id in the payload
            27 | 28 => (v - 27) as u8,
            v if v >= 35 => {
                let chain_id = (v - 35) / 2;
                if chain_id != self.chain_id {
                    return Err(MonitorError::Signature(format!(
                        "transaction signed for chain {}, expected {}",
                        chain_id, self.chain_id
                    )));
                }
                fields.push(rlp(self.chain_id));
                fields.push(rlp(0u8));
                fields.push(rlp(0u8));
                ((v - 35) % 2) as u8
            }
            v => {
                return Err(MonitorError::Signature(format!("invalid legacy v: {}", v)));
            }
        };

        Ok((keccak256(rlp_list(&fields)), parity))
    }

    fn check_chain_id(&self, tx: &Transaction) -> Result<()> {
        match tx.chain_id {
            Some(id) if id == self.chain_id => Ok(()),
            Some(id) => Err(MonitorError::Signature(format!(
                "transaction signed for chain {}, expected {}",
                id, self.chain_id
            ))),
            None => Err(MonitorError::Signature(
                "typed transaction without chainId".to_string(),
            )),
        }
    }

    /// Recover the address that signed `tx`.
    pub fn recover_sender(&self, tx: &Transaction) -> Result<Address> {
        let (hash, parity) = self.signing_hash(tx)?;
        recover_address(hash, tx.r, tx.s, parity)
    }
}

/// Recover an address from a prehashed message and an (r, s, parity) signature.
pub fn recover_address(hash: B256, r: U256, s: U256, parity: u8) -> Result<Address> {
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&r.to_be_bytes::<32>());
    compact[32..].copy_from_slice(&s.to_be_bytes::<32>());

    let signature = Signature::from_slice(&compact)
        .map_err(|e| MonitorError::Signature(format!("invalid signature bytes: {}", e)))?;
    let mut recovery_id = RecoveryId::from_byte(parity)
        .ok_or_else(|| MonitorError::Signature(format!("invalid recovery id: {}", parity)))?;

    // k256 only verifies low-s signatures; negating s flips the parity of R.
    let signature = match signature.normalize_s() {
        Some(normalized) => {
            recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
            normalized
        }
        None => signature,
    };

    let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &signature, recovery_id)
        .map_err(|e| MonitorError::Signature(e.to_string()))?;
    Ok(public_key_address(&key))
}

/// Ethereum address of a secp256k1 public key.
pub fn public_key_address(key: &VerifyingKey) -> Address {
    let uncompressed = key.to_encoded_point(false);
    let digest = keccak256(&uncompressed.as_bytes()[1..]);
    Address::from_slice(&digest[12..])
}

fn required(value: Option<U256>, field: &str) -> Result<U256> {
    value.ok_or_else(|| MonitorError::Signature(format!("transaction missing {}", field)))
}

fn typed_parity(tx: &Transaction) -> Result<u8> {
    let parity = match tx.y_parity {
        Some(p) => p,
        None => tx
            .v
            .try_into()
            .map_err(|_| MonitorError::Signature(format!("v out of range: {}", tx.v)))?,
    };
    match parity {
        0 | 1 => Ok(parity as u8),
        other => Err(MonitorError::Signature(format!("invalid y-parity: {}", other))),
    }
}

fn typed_hash(tx_type: u8, fields: &[Vec<u8>]) -> B256 {
    let payload = rlp_list(fields);
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(tx_type);
    out.extend_from_slice(&payload);
    keccak256(out)
}

fn rlp<T: Encodable>(value: T) -> Vec<u8> {
    alloy_rlp::encode(value)
}

fn rlp_to(to: Option<Address>) -> Vec<u8> {
    match to {
        Some(addr) => rlp(addr),
        None => vec![EMPTY_STRING_CODE],
    }
}

fn rlp_list(fields: &[Vec<u8>]) -> Vec<u8> {
    let payload_length: usize = fields.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(payload_length + 9);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    for field in fields {
        out.extend_from_slice(field);
    }
    out
}

fn rlp_access_list(items: &[AccessListItem]) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = items
        .iter()
        .map(|item| {
            let keys: Vec<Vec<u8>> = item.storage_keys.iter().map(|k| rlp(*k)).collect();
            rlp_list(&[rlp(item.address), rlp_list(&keys)])
        })
        .collect();
    rlp_list(&encoded)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy_primitives::address;
    use k256::ecdsa::SigningKey;

    /// Hardhat / anvil account #0
    pub(crate) const DEV_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    pub(crate) fn dev_signing_key() -> SigningKey {
        SigningKey::from_slice(&hex::decode(DEV_KEY).unwrap()).unwrap()
    }

    pub(crate) fn unsigned_tx(tx_type: u64, chain_id: u64) -> Transaction {
        let typed = tx_type != 0;
        Transaction {
            hash: B256::ZERO,
            from: None,
            to: Some(address!("2279b7a0a67db372996a5fab50d91eaa73d2ebe6")),
            value: U256::from(1_000u64),
            input: vec![0xa9, 0x05, 0x9c, 0xbb, 0x00, 0x01],
            nonce: 7,
            gas: U256::from(60_000u64),
            gas_price: if tx_type == 2 { None } else { Some(U256::from(2_000_000_000u64)) },
            max_fee_per_gas: if tx_type == 2 { Some(U256::from(3_000_000_000u64)) } else { None },
            max_priority_fee_per_gas: if tx_type == 2 {
                Some(U256::from(1_000_000_000u64))
            } else {
                None
            },
            tx_type: Some(tx_type),
            chain_id: if typed { Some(chain_id) } else { None },
            access_list: if typed {
                Some(vec![AccessListItem {
                    address: address!("5fbdb2315678afecb367f032d93f642f64180aa3"),
                    storage_keys: vec![B256::repeat_byte(0x11)],
                }])
            } else {
                None
            },
            v: U256::ZERO,
            r: U256::ZERO,
            s: U256::ZERO,
            y_parity: None,
        }
    }

    /// Sign `tx` in place with `key`, encoding v the way the node reports it.
    pub(crate) fn sign(tx: &mut Transaction, key: &SigningKey, signer: &ChainSigner) {
        if tx.envelope_type() == 0 {
            // Placeholder v selects the EIP-155 payload for hashing
            tx.v = U256::from(signer.chain_id() * 2 + 35);
        }
        let (hash, _) = signer.signing_hash(tx).unwrap();
        let (signature, recovery_id) = key.sign_prehash_recoverable(hash.as_slice()).unwrap();
        let bytes = signature.to_bytes();
        tx.r = U256::from_be_slice(&bytes[..32]);
        tx.s = U256::from_be_slice(&bytes[32..]);
        let parity = recovery_id.to_byte() as u64;
        if tx.envelope_type() == 0 {
            tx.v = U256::from(signer.chain_id() * 2 + 35 + parity);
        } else {
            tx.v = U256::from(parity);
            tx.y_parity = Some(parity);
        }
    }

    #[test]
    fn test_public_key_address() {
        let key = dev_signing_key();
        assert_eq!(
            public_key_address(key.verifying_key()),
            address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
    }

    #[test]
    fn test_eip155_signing_hash() {
        // Example transaction from EIP-155
        let mut tx = unsigned_tx(0, 1);
        tx.nonce = 9;
        tx.gas_price = Some(U256::from(20_000_000_000u64));
        tx.gas = U256::from(21_000u64);
        tx.to = Some(address!("3535353535353535353535353535353535353535"));
        tx.value = U256::from(1_000_000_000_000_000_000u64);
        tx.input = vec![];
        tx.v = U256::from(37u64);

        let signer = ChainSigner::new(1);
        let (hash, parity) = signer.signing_hash(&tx).unwrap();
        let expected: B256 = "0xdaf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
            .parse()
            .unwrap();
        assert_eq!(hash, expected);
        assert_eq!(parity, 0);

        let key = SigningKey::from_slice(&[0x46u8; 32]).unwrap();
        let (signature, recovery_id) = key.sign_prehash_recoverable(hash.as_slice()).unwrap();
        let bytes = signature.to_bytes();
        let recovered = recover_address(
            hash,
            U256::from_be_slice(&bytes[..32]),
            U256::from_be_slice(&bytes[32..]),
            recovery_id.to_byte(),
        )
        .unwrap();
        assert_eq!(recovered, address!("9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f"));
    }

    #[test]
    fn test_recover_each_envelope_type() {
        let key = dev_signing_key();
        let expected = public_key_address(key.verifying_key());
        let signer = ChainSigner::new(31337);

        for tx_type in [0u64, 1, 2] {
            let mut tx = unsigned_tx(tx_type, 31337);
            sign(&mut tx, &key, &signer);
            assert_eq!(signer.recover_sender(&tx).unwrap(), expected, "type {}", tx_type);
        }
    }

    #[test]
    fn test_pre_eip155_legacy() {
        let key = dev_signing_key();
        let signer = ChainSigner::new(1);
        let mut tx = unsigned_tx(0, 1);
        tx.v = U256::from(27u64);

        let (hash, _) = signer.signing_hash(&tx).unwrap();
        let (signature, recovery_id) = key.sign_prehash_recoverable(hash.as_slice()).unwrap();
        let bytes = signature.to_bytes();
        tx.r = U256::from_be_slice(&bytes[..32]);
        tx.s = U256::from_be_slice(&bytes[32..]);
        tx.v = U256::from(27u64 + recovery_id.to_byte() as u64);

        assert_eq!(
            signer.recover_sender(&tx).unwrap(),
            public_key_address(key.verifying_key())
        );
    }

    #[test]
    fn test_wrong_chain_rejected() {
        let key = dev_signing_key();
        let mut tx = unsigned_tx(2, 31337);
        sign(&mut tx, &key, &ChainSigner::new(31337));

        let mainnet = ChainSigner::new(1);
        assert!(matches!(mainnet.recover_sender(&tx), Err(MonitorError::Signature(_))));

        let mut legacy = unsigned_tx(0, 31337);
        sign(&mut legacy, &key, &ChainSigner::new(31337));
        assert!(matches!(mainnet.recover_sender(&legacy), Err(MonitorError::Signature(_))));
    }

    #[test]
    fn test_high_s_is_normalized() {
        let key = dev_signing_key();
        let signer = ChainSigner::new(31337);
        let mut tx = unsigned_tx(2, 31337);
        sign(&mut tx, &key, &signer);

        // Secp256k1 group order
        let n = U256::from_str_radix(
            "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
            16,
        )
        .unwrap();
        tx.s = n - tx.s;
        let parity = 1 - tx.y_parity.unwrap();
        tx.y_parity = Some(parity);
        tx.v = U256::from(parity);

        assert_eq!(
            signer.recover_sender(&tx).unwrap(),
            public_key_address(key.verifying_key())
        );
    }

    #[test]
    fn test_unsupported_type() {
        let tx = unsigned_tx(3, 1);
        assert!(ChainSigner::new(1).signing_hash(&tx).is_err());
    }
}
