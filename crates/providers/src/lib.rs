//! LLM provider implementations and the model gateway for Parley.
//!
//! All providers implement the `parley_core::Provider` trait.
//! The gateway walks a configured chain of (provider, model) entries and
//! returns the first usable, sanitized reply.

pub mod gateway;
pub mod health;
pub mod openai_compat;
pub mod router;
pub mod sanitize;

pub use gateway::{ChainEntry, Completion, CompletionSource, ModelGateway};
pub use health::ProviderHealth;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
pub use sanitize::sanitize_reply;
