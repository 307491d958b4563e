//! Contract ABI registry
//!
//! Parses a JSON ABI description once per run and indexes its functions by
//! 4-byte selector and its events by topic hash. The registry is immutable
//! after `build` and shared read-only by the decoder and the aggregator.

use crate::error::{MonitorError, Result};
use alloy_json_abi::{Event, Function, JsonAbi};
use alloy_primitives::B256;
use std::collections::HashMap;

/// Lookup structure over a contract ABI.
#[derive(Debug, Clone)]
pub struct AbiRegistry {
    functions: HashMap<[u8; 4], Function>,
    events: HashMap<B256, Event>,
    function_names: Vec<String>,
    event_names: Vec<String>,
}

impl AbiRegistry {
    /// Parse an ABI description (JSON array of entries with `type`, `name`, `inputs`).
    ///
    /// Constructors, fallback, receive and error entries are ignored. Two
    /// distinct signatures hashing to the same selector or topic make the ABI
    /// malformed; a repeated identical signature is kept once.
    pub fn build(abi_json: &str) -> Result<Self> {
        let abi: JsonAbi = serde_json::from_str(abi_json)
            .map_err(|e| MonitorError::MalformedAbi(e.to_string()))?;

        let mut registry = Self {
            functions: HashMap::new(),
            events: HashMap::new(),
            function_names: Vec::new(),
            event_names: Vec::new(),
        };

        for function in abi.functions() {
            registry.insert_function(function)?;
        }
        for event in abi.events() {
            registry.insert_event(event)?;
        }

        Ok(registry)
    }

    fn insert_function(&mut self, function: &Function) -> Result<()> {
        require_name(&function.name)?;
        let selector = function.selector().0;
        if let Some(existing) = self.functions.get(&selector) {
            return check_duplicate(&existing.signature(), &function.signature());
        }
        self.functions.insert(selector, function.clone());
        push_unique(&mut self.function_names, &function.name);
        Ok(())
    }

    fn insert_event(&mut self, event: &Event) -> Result<()> {
        require_name(&event.name)?;
        // Anonymous events have no topic to look up, but their name is still declared
        if !event.anonymous {
            let topic = event.selector();
            if let Some(existing) = self.events.get(&topic) {
                return check_duplicate(&existing.signature(), &event.signature());
            }
            self.events.insert(topic, event.clone());
        }
        push_unique(&mut self.event_names, &event.name);
        Ok(())
    }

    /// Function declared under this selector.
    pub fn resolve_function(&self, selector: [u8; 4]) -> Option<&Function> {
        self.functions.get(&selector)
    }

    /// Non-anonymous event declared under this topic hash.
    pub fn resolve_event(&self, topic: &B256) -> Option<&Event> {
        self.events.get(topic)
    }

    /// Distinct function names, sorted. Overloads share one name.
    pub fn function_names(&self) -> &[String] {
        &self.function_names
    }

    /// Distinct event names, sorted.
    pub fn event_names(&self) -> &[String] {
        &self.event_names
    }

    /// Union of function and event names, without duplicates.
    ///
    /// Both counters of a run are seeded from this.
    pub fn declared_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.function_names.iter().chain(self.event_names.iter()) {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MonitorError::MalformedAbi("entry has an empty name".to_string()));
    }
    Ok(())
}

fn check_duplicate(previous: &str, signature: &str) -> Result<()> {
    if previous == signature {
        return Ok(());
    }
    Err(MonitorError::MalformedAbi(format!(
        "{} and {} hash to the same identifier",
        previous, signature
    )))
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}
