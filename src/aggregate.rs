//! Per-run frequency counters
//!
//! A `Counter` is seeded with every declared name at zero so unused methods
//! and events still show up in the report. Recording a name outside the
//! seeded set is a no-op: the counter never grows new keys.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Counter {
    counts: BTreeMap<String, u64>,
}

impl Counter {
    /// Counter with every name present at zero.
    pub fn seed<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let counts = names
            .into_iter()
            .map(|name| (name.as_ref().to_string(), 0))
            .collect();
        Self { counts }
    }

    /// Increment `name` in place. Returns false if the name was never seeded.
    pub fn record(&mut self, name: &str) -> bool {
        match self.counts.get_mut(name) {
            Some(count) => {
                *count = count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.counts.get(name).copied()
    }

    /// Sum over all names.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn is_all_zero(&self) -> bool {
        self.counts.values().all(|&c| c == 0)
    }

    /// Names with their counts, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(name, &count)| (name.as_str(), count))
    }
}
