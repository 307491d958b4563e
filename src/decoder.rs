//! Call data and log decoding
//!
//! Resolves a transaction's selector and each receipt log's first topic
//! against the ABI registry. A miss is an expected outcome for activity
//! outside the ABI and is returned as `DecodeMiss`, never as a run failure.

use crate::abi::AbiRegistry;
use crate::error::DecodeMiss;
use crate::types::{Log, Receipt};

/// Resolve the method name invoked by `data`.
pub fn decode_call<'a>(data: &[u8], registry: &'a AbiRegistry) -> Result<&'a str, DecodeMiss> {
    if data.len() < 4 {
        return Err(DecodeMiss::ShortCalldata { len: data.len() });
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&data[..4]);
    registry
        .resolve_function(selector)
        .map(|function| function.name.as_str())
        .ok_or(DecodeMiss::UnknownSelector(selector))
}

/// Resolve the event name of a single log from its first topic.
pub fn decode_log<'a>(log: &Log, registry: &'a AbiRegistry) -> Result<&'a str, DecodeMiss> {
    let topic = log.topics.first().ok_or(DecodeMiss::AnonymousLog)?;
    registry
        .resolve_event(topic)
        .map(|event| event.name.as_str())
        .ok_or(DecodeMiss::UnknownTopic(*topic))
}

/// Resolve every log of a receipt, in log order.
pub fn decode_logs<'a>(
    receipt: &Receipt,
    registry: &'a AbiRegistry,
) -> Vec<Result<&'a str, DecodeMiss>> {
    receipt
        .logs
        .iter()
        .map(|log| decode_log(log, registry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::tests::{event_topic, function_selector, TOKEN_ABI};
    use alloy_primitives::{Address, B256, U256};

    fn registry() -> AbiRegistry {
        AbiRegistry::build(TOKEN_ABI).unwrap()
    }

    fn log_with_topics(topics: Vec<B256>) -> Log {
        Log {
            address: Address::ZERO,
            topics,
            data: vec![],
        }
    }

    fn receipt_with_logs(logs: Vec<Log>) -> Receipt {
        Receipt {
            transaction_hash: B256::ZERO,
            status: Some(1),
            gas_used: U256::from(21000),
            logs,
        }
    }

    #[test]
    fn test_decode_call_round_trip() {
        let registry = registry();
        for function in registry.functions() {
            let mut data = function.selector().to_vec();
            data.extend_from_slice(&[0u8; 64]);
            assert_eq!(decode_call(&data, &registry).unwrap(), function.name);
        }
    }

    #[test]
    fn test_decode_call_short_data() {
        let registry = registry();
        assert_eq!(
            decode_call(&[0xa9, 0x05], &registry),
            Err(DecodeMiss::ShortCalldata { len: 2 })
        );
        assert_eq!(decode_call(&[], &registry), Err(DecodeMiss::ShortCalldata { len: 0 }));
    }

    #[test]
    fn test_decode_call_unknown_selector() {
        let registry = registry();
        let selector = function_selector("withdraw(uint256)");
        assert_eq!(
            decode_call(&selector, &registry),
            Err(DecodeMiss::UnknownSelector(selector))
        );
    }

    #[test]
    fn test_decode_logs_mixed() {
        let registry = registry();
        let unknown = event_topic("Deposit(address,uint256)");
        let receipt = receipt_with_logs(vec![
            log_with_topics(vec![event_topic("Transfer(address,address,uint256)")]),
            log_with_topics(vec![]),
            log_with_topics(vec![unknown]),
            log_with_topics(vec![event_topic("Approval(address,address,uint256)")]),
        ]);

        let decoded = decode_logs(&receipt, &registry);
        assert_eq!(
            decoded,
            vec![
                Ok("Transfer"),
                Err(DecodeMiss::AnonymousLog),
                Err(DecodeMiss::UnknownTopic(unknown)),
                Ok("Approval"),
            ]
        );
    }
}
