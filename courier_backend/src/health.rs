use std::collections::BTreeMap;

use crate::error::StoreError;

/// Counts consecutive storage failures per record.
///
/// A single failed read or write only fails the operation that issued it.
/// Once one record fails `threshold` times in a row the tracker raises an
/// alert for the operator screen; the alert clears on that record's next
/// successful operation.
#[derive(Debug, Clone)]
pub struct IoFailureTracker {
    threshold: u32,
    consecutive: BTreeMap<String, u32>,
}

impl IoFailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: BTreeMap::new(),
        }
    }

    /// Fold the outcome of an operation on `record` into the counters.
    pub fn observe<T>(&mut self, record: &str, result: &Result<T, StoreError>) {
        match result {
            Err(StoreError::IoFailure { source, .. }) => {
                let count = self.consecutive.entry(record.to_string()).or_insert(0);
                *count += 1;
                if *count == self.threshold {
                    tracing::error!(
                        "Storage for '{}' failed {} times in a row: {}",
                        record,
                        count,
                        source
                    );
                } else {
                    tracing::warn!("Storage failure on '{}' ({}): {}", record, count, source);
                }
            }
            Err(_) => {}
            Ok(_) => {
                if self.consecutive.remove(record).is_some() {
                    tracing::info!("Storage for '{}' recovered", record);
                }
            }
        }
    }

    pub fn failures(&self, record: &str) -> u32 {
        self.consecutive.get(record).copied().unwrap_or(0)
    }

    /// First record at or past the threshold, rendered for the operator.
    pub fn alert(&self) -> Option<String> {
        self.consecutive
            .iter()
            .find(|(_, count)| **count >= self.threshold)
            .map(|(record, count)| {
                format!("Storage error: {} failed {}x", record, count)
            })
    }
}
