//! Conversation memory — short-term per-conversation state.
//!
//! Each conversation keeps a bounded history of turns, the time of the last
//! accepted user turn, and the last classified topic. A store persists one
//! record per conversation and always reads/writes it wholesale.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::message::{ConversationId, Message, Role, Topic};

/// Default number of turns retained per conversation.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Durable state for one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationMemory {
    /// Turns in insertion order, oldest first
    #[serde(default)]
    pub history: Vec<Message>,

    /// When the most recent accepted user turn arrived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interaction_at: Option<DateTime<Utc>>,

    /// Last classified topic
    #[serde(default)]
    pub topic: Topic,
}

impl ConversationMemory {
    /// Append a turn and evict the oldest turns beyond `limit`.
    pub fn push(&mut self, turn: Message, limit: usize) {
        self.history.push(turn);
        self.trim(limit);
    }

    /// Keep only the `limit` most recent turns.
    pub fn trim(&mut self, limit: usize) {
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }

    /// The content of the most recent user turn, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// The core ConversationStore trait.
///
/// Implementations: file-per-conversation JSON, in-memory (for testing).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// Load a conversation's memory.
    ///
    /// Never fails: a missing or unreadable record yields the default empty state.
    async fn load(&self, id: &ConversationId) -> ConversationMemory;

    /// Overwrite a conversation's record in full.
    ///
    /// Readers never observe a partially written record.
    async fn save(
        &self,
        id: &ConversationId,
        memory: &ConversationMemory,
    ) -> std::result::Result<(), MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_evicts_oldest_first() {
        let mut memory = ConversationMemory::default();
        for i in 0..25 {
            memory.push(Message::user(format!("turn {i}")), DEFAULT_HISTORY_LIMIT);
            assert!(memory.history.len() <= DEFAULT_HISTORY_LIMIT);
        }
        assert_eq!(memory.history.len(), 10);
        assert_eq!(memory.history[0].content, "turn 15");
        assert_eq!(memory.history[9].content, "turn 24");
    }

    #[test]
    fn last_user_text_skips_assistant_turns() {
        let mut memory = ConversationMemory::default();
        memory.push(Message::user("price of honey?"), 10);
        memory.push(Message::assistant("KSh 500"), 10);
        assert_eq!(memory.last_user_text(), Some("price of honey?"));
    }

    #[test]
    fn empty_memory_deserializes_from_empty_object() {
        let memory: ConversationMemory = serde_json::from_str("{}").unwrap();
        assert!(memory.history.is_empty());
        assert!(memory.last_interaction_at.is_none());
        assert_eq!(memory.topic, Topic::General);
    }
}
