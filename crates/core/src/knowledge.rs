//! Knowledge trait — static topic → text mapping injected into prompts.

use async_trait::async_trait;

use crate::error::KnowledgeError;

/// An ordered mapping from topic label to raw text.
///
/// Order is the order in which the source produced the entries, and is
/// significant: fallback selection uses the first entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    entries: Vec<(String, String)>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the text for a topic. Replacing keeps the original position.
    pub fn insert(&mut self, topic: impl Into<String>, text: impl Into<String>) {
        let topic = topic.into();
        let text = text.into();
        match self.entries.iter_mut().find(|(t, _)| *t == topic) {
            Some(entry) => entry.1 = text,
            None => self.entries.push((topic, text)),
        }
    }

    /// Look up the text for a topic.
    pub fn get(&self, topic: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == topic)
            .map(|(_, text)| text.as_str())
    }

    /// Iterate entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, text)| (t.as_str(), text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where knowledge comes from (a directory of files, a fixture in tests).
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Read the whole knowledge store.
    async fn load_all(&self) -> std::result::Result<KnowledgeBase, KnowledgeError>;
}
