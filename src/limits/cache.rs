use dashmap::DashMap;

/// Per-model detected context limits.
///
/// Entry states:
/// - absent: not queried yet
/// - `Some(None)`: queried, nothing discoverable
/// - `Some(Some(n))`: queried, limit `n`
///
/// Reads and writes are not combined atomically. Two concurrent lookups of the
/// same uncached model may both query the backend; both store the same value,
/// so the duplicate query is the only cost.
#[derive(Debug, Default)]
pub struct ModelLimitCache {
    entries: DashMap<String, Option<usize>>,
}

impl ModelLimitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, model: &str) -> Option<Option<usize>> {
        self.entries.get(model).map(|entry| *entry.value())
    }

    pub fn insert(&self, model: &str, detected: Option<usize>) {
        self.entries.insert(model.to_string(), detected);
    }

    /// Forget everything; the next lookup for each model queries again.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
