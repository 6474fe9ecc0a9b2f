//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley conversational
//! assistant. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the response pipeline is a trait here. Implementations
//! live in their respective crates. This enables:
//! - Swapping storage and transport implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod channel;
pub mod error;
pub mod knowledge;
pub mod memory;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelId, ChannelMessage};
pub use error::{Error, Result};
pub use knowledge::{KnowledgeBase, KnowledgeSource};
pub use memory::{ConversationMemory, ConversationStore};
pub use message::{ConversationId, Message, Role, Topic, Turn};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
