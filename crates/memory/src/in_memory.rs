//! In-memory conversation store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use parley_core::error::MemoryError;
use parley_core::memory::{ConversationMemory, ConversationStore};
use parley_core::message::ConversationId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Conversation records held in a map. Nothing survives a restart.
pub struct InMemoryConversationStore {
    records: Arc<RwLock<HashMap<ConversationId, ConversationMemory>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of conversations with a saved record.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self, id: &ConversationId) -> ConversationMemory {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    async fn save(
        &self,
        id: &ConversationId,
        memory: &ConversationMemory,
    ) -> Result<(), MemoryError> {
        self.records.write().await.insert(id.clone(), memory.clone());
        Ok(())
    }
}
