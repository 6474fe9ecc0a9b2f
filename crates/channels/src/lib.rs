//! Messaging channel adapters for Parley.
//!
//! A channel delivers inbound text messages to the orchestrator and carries
//! replies back out. Channels are trait-based and platform-agnostic.
//!
//! Available channels:
//! - **CLI** — Interactive terminal chat (stdin/stdout)
//! - **Webhook** — Inbound HTTP webhooks, replies POSTed to a callback URL

pub mod cli;
pub mod webhook;

pub use cli::CliChannel;
pub use webhook::WebhookChannel;
