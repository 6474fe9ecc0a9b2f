//! The orchestrator — runs one inbound message through the reply pipeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parley_config::AppConfig;
use parley_core::channel::{Channel, ChannelMessage};
use parley_core::error::ChannelError;
use parley_core::memory::{ConversationStore, DEFAULT_HISTORY_LIMIT};
use parley_core::message::{ConversationId, Message};
use parley_memory::KnowledgeIndex;
use parley_providers::ModelGateway;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::gate::ResponseGate;
use crate::intent::IntentClassifier;
use crate::locks::ConversationLocks;
use crate::prompt::PromptBuilder;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Turns inbound channel messages into stored turns and outbound replies.
pub struct Orchestrator {
    store: Arc<dyn ConversationStore>,
    knowledge: Arc<KnowledgeIndex>,
    gateway: Arc<ModelGateway>,
    gate: ResponseGate,
    classifier: IntentClassifier,
    prompts: PromptBuilder,
    locks: ConversationLocks,
    history_limit: usize,
    ignored_suffixes: Vec<String>,
    clock: Clock,
}

impl Orchestrator {
    /// Create an orchestrator with default policy.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        knowledge: Arc<KnowledgeIndex>,
        gateway: Arc<ModelGateway>,
    ) -> Self {
        Self::from_config(&AppConfig::default(), store, knowledge, gateway)
    }

    /// Create an orchestrator whose policy comes from `config`.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn ConversationStore>,
        knowledge: Arc<KnowledgeIndex>,
        gateway: Arc<ModelGateway>,
    ) -> Self {
        Self {
            store,
            knowledge,
            gateway,
            gate: ResponseGate::from_policy(&config.policy),
            classifier: IntentClassifier::new(&config.policy.topics),
            prompts: PromptBuilder::from_config(config),
            locks: ConversationLocks::new(),
            history_limit: config.policy.history_limit.max(2),
            ignored_suffixes: config.policy.ignored_chat_suffixes.clone(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Override the history limit (default 10).
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = if limit == 0 { DEFAULT_HISTORY_LIMIT } else { limit };
        self
    }

    /// Replace the wall clock, for tests that exercise the follow-up window.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn is_ignored_chat(&self, chat_id: &str) -> bool {
        self.ignored_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && chat_id.ends_with(suffix.as_str()))
    }

    /// Handle one inbound message and deliver the reply, if any, through `channel`.
    ///
    /// Never fails: errors are logged and the message is dropped with stored
    /// state left as it was.
    pub async fn handle(&self, msg: &ChannelMessage, channel: &dyn Channel) -> Option<String> {
        let text = msg.content.trim();
        let chat_id = msg.chat_id.as_str();

        if text.is_empty() || chat_id.is_empty() {
            return None;
        }
        if msg.from_self {
            debug!(chat_id, "Ignoring own message");
            return None;
        }
        if self.is_ignored_chat(chat_id) {
            debug!(chat_id, "Ignoring broadcast chat");
            return None;
        }

        let _guard = self.locks.acquire(chat_id).await;

        let reply = match self.respond(chat_id, text).await {
            Ok(Some(reply)) => reply,
            Ok(None) => return None,
            Err(e) => {
                error!(chat_id, error = %e, "Failed to process message");
                return None;
            }
        };

        if let Err(e) = channel.send(chat_id, &reply, None).await {
            warn!(chat_id, channel = channel.name(), error = %e, "Reply delivery failed");
        }

        Some(reply)
    }

    /// Steps between loading and persisting a conversation. The only write is
    /// the final save, so an early return leaves the record untouched.
    async fn respond(&self, chat_id: &str, text: &str) -> parley_core::Result<Option<String>> {
        let id = ConversationId::from(chat_id);
        let mut memory = self.store.load(&id).await;

        if memory.last_user_text() == Some(text) {
            debug!(chat_id, "Duplicate of last user turn, skipping");
            return Ok(None);
        }

        let now = (self.clock)();
        let Some(reason) = self.gate.evaluate(text, memory.last_interaction_at, now) else {
            debug!(chat_id, "Gate: no reply needed");
            return Ok(None);
        };

        let topic = self.classifier.classify(text);
        debug!(chat_id, ?reason, %topic, "Message accepted");

        let context = self.prompts.render_context(&memory.history);

        memory.topic = topic;
        memory.last_interaction_at = Some(now);
        memory.push(Message::user(text), self.history_limit);

        let kb = self.knowledge.load().await;
        let knowledge = KnowledgeIndex::select(topic, &kb);
        let prompt = self.prompts.build(&knowledge, &context, text);

        let completion = self.gateway.complete(&prompt).await;
        if completion.content.trim().is_empty() {
            warn!(chat_id, "Empty completion, nothing to send");
            return Ok(None);
        }

        memory.push(Message::assistant(completion.content.clone()), self.history_limit);
        self.store.save(&id, &memory).await?;

        info!(
            chat_id,
            %topic,
            source = ?completion.source,
            turns = memory.history.len(),
            "Reply ready"
        );
        Ok(Some(completion.content))
    }

    /// Start `channel` and handle every inbound message on its own task.
    ///
    /// Returns when the channel's stream ends, after in-flight messages finish.
    /// A panic while handling one message is logged and does not affect others.
    pub async fn run(self: Arc<Self>, channel: Arc<dyn Channel>) -> Result<(), ChannelError> {
        let inbound = channel.start().await?;
        self.dispatch(channel, inbound).await;
        Ok(())
    }

    /// Handle every message of an already started channel's `inbound` stream.
    ///
    /// Returns once the stream ends and in-flight messages finish.
    pub async fn dispatch(
        self: Arc<Self>,
        channel: Arc<dyn Channel>,
        mut inbound: mpsc::Receiver<Result<ChannelMessage, ChannelError>>,
    ) {
        info!(channel = channel.name(), "Dispatcher started");

        let mut inflight: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                item = inbound.recv() => match item {
                    Some(Ok(msg)) => {
                        let this = self.clone();
                        let channel = channel.clone();
                        inflight.spawn(async move {
                            this.handle(&msg, channel.as_ref()).await;
                        });
                    }
                    Some(Err(e)) => warn!(channel = channel.name(), error = %e, "Inbound error, skipping"),
                    None => break,
                },
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    log_join(joined);
                }
            }
        }

        while let Some(joined) = inflight.join_next().await {
            log_join(joined);
        }

        info!(channel = channel.name(), "Dispatcher stopped");
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "Message task panicked");
        } else {
            warn!(error = %e, "Message task cancelled");
        }
    }
}
