//! Premium provider health flags.
//!
//! A premium chain entry that fails is skipped by every subsequent gateway
//! call until it produces a reply again. The set is shared by all concurrent
//! calls; each read and write is locked, but a check-then-call-then-update
//! sequence is not atomic. Two calls racing on a recovering entry may both
//! try it, which is harmless.

use std::collections::HashSet;
use std::sync::Mutex;

/// Process-wide set of chain entries currently considered failed.
#[derive(Debug, Default)]
pub struct ProviderHealth {
    failed: Mutex<HashSet<String>>,
}

impl ProviderHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is flagged failed.
    pub fn is_failed(&self, key: &str) -> bool {
        self.failed
            .lock()
            .map(|set| set.contains(key))
            .unwrap_or(false)
    }

    pub fn mark_failed(&self, key: &str) {
        if let Ok(mut set) = self.failed.lock() {
            set.insert(key.to_string());
        }
    }

    pub fn mark_healthy(&self, key: &str) {
        if let Ok(mut set) = self.failed.lock() {
            set.remove(key);
        }
    }

    /// Snapshot of flagged keys, sorted.
    pub fn failed_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .failed
            .lock()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}
