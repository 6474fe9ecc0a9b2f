//! Per-conversation serialization.
//!
//! Two messages from the same chat must not run the pipeline concurrently:
//! both would load the same record and the later save would drop the other
//! turn. Messages from different chats never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// Map size above which idle entries are pruned.
const PRUNE_THRESHOLD: usize = 1_024;

/// Keyed async mutexes, one per conversation id.
pub struct ConversationLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `conversation_id`.
    ///
    /// Access is released when the returned guard is dropped.
    pub async fn acquire(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());

            if locks.len() > PRUNE_THRESHOLD {
                // Only the map holds an idle lock.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }

            locks
                .entry(conversation_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        lock.lock_owned().await
    }

    /// Number of tracked conversations.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConversationLocks {
    fn default() -> Self {
        Self::new()
    }
}
