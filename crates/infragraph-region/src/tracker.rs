use std::collections::BTreeMap;

use dashmap::DashMap;

/// Counts outbound calls per service label, e.g. `discovery.instances`.
#[derive(Debug, Default)]
pub struct Tracker {
    calls: DashMap<String, u64>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, service: &str) {
        if let Some(mut count) = self.calls.get_mut(service) {
            *count += 1;
            return;
        }
        *self.calls.entry(service.to_string()).or_insert(0) += 1;
    }

    pub fn count(&self, service: &str) -> u64 {
        self.calls.get(service).map_or(0, |c| *c)
    }

    pub fn total(&self) -> u64 {
        self.calls.iter().map(|c| *c.value()).sum()
    }

    /// Sorted copy of the counters.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.calls
            .iter()
            .map(|c| (c.key().clone(), *c.value()))
            .collect()
    }
}
