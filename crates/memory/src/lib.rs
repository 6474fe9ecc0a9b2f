//! Conversation memory stores and the knowledge index for Parley.

pub mod file_backend;
pub mod in_memory;
pub mod knowledge;

pub use file_backend::FileConversationStore;
pub use in_memory::InMemoryConversationStore;
pub use knowledge::{DirectoryKnowledgeSource, KnowledgeIndex, truncate_chars};
