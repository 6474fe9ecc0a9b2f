//! Response orchestration — the heart of Parley.
//!
//! Every inbound message flows through the same pipeline:
//!
//! 1. **Filter** empty text, our own messages, and broadcast chats
//! 2. **Load** the conversation's memory (under a per-conversation lock)
//! 3. **Suppress** exact repeats of the last user turn
//! 4. **Gate**: only greetings, questions, or follow-ups get a reply
//! 5. **Classify** intent and pick matching knowledge
//! 6. **Prompt** the model gateway with knowledge and recent context
//! 7. **Persist** both turns and deliver the reply through the channel

pub mod gate;
pub mod intent;
pub mod locks;
pub mod orchestrator;
pub mod prompt;

pub use gate::{GateReason, ResponseGate};
pub use intent::IntentClassifier;
pub use locks::ConversationLocks;
pub use orchestrator::Orchestrator;
pub use prompt::PromptBuilder;
