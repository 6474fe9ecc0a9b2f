//! Model gateway — ordered fallback chain with per-entry timeouts.
//!
//! Each call walks the chain in order. An entry that times out, errors, or
//! returns only whitespace is skipped and the next one is tried. Premium
//! entries that failed recently are left out until one of them answers
//! again. The gateway never returns an error: when nothing answers, the
//! caller gets a fixed user-facing message instead.

use parley_core::error::ProviderError;
use parley_core::message::Message;
use parley_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::health::ProviderHealth;
use crate::sanitize::sanitize_reply;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(12);

/// A single (provider, model) entry in the chain.
pub struct ChainEntry {
    provider: Arc<dyn Provider>,
    model: String,
    premium: bool,
    timeout: Duration,
}

impl ChainEntry {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            premium: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn premium(mut self, premium: bool) -> Self {
        self.premium = premium;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Key used for health flags: `provider/model`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider.name(), self.model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_premium(&self) -> bool {
        self.premium
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }
}

/// Where a completion came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionSource {
    /// A chain entry answered.
    Provider { provider: String, model: String },
    /// Every eligible entry failed; content is the unavailable message.
    Unavailable,
    /// No entry has credentials; content is the not-configured message.
    NotConfigured,
}

/// The gateway's answer to one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub source: CompletionSource,
}

impl Completion {
    /// Whether a model produced this content (as opposed to a fixed message).
    pub fn is_generated(&self) -> bool {
        matches!(self.source, CompletionSource::Provider { .. })
    }
}

/// Walks the configured chain and returns the first usable reply.
pub struct ModelGateway {
    chain: Vec<ChainEntry>,
    health: Arc<ProviderHealth>,
    system_instruction: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
    unavailable_message: String,
    not_configured_message: String,
}

impl ModelGateway {
    /// Create a gateway with an empty chain, sharing `health` with other gateways.
    pub fn new(health: Arc<ProviderHealth>) -> Self {
        Self {
            chain: Vec::new(),
            health,
            system_instruction: None,
            temperature: 0.7,
            max_tokens: None,
            unavailable_message: "Sorry, all models are currently unavailable. Please try again later."
                .into(),
            not_configured_message: "The assistant is not configured yet. Please set an API key."
                .into(),
        }
    }

    /// Append an entry to the chain.
    pub fn add(mut self, entry: ChainEntry) -> Self {
        self.chain.push(entry);
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        self.system_instruction = (!instruction.trim().is_empty()).then_some(instruction);
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Override the fixed replies used when nothing answers.
    pub fn with_fallback_messages(
        mut self,
        unavailable: impl Into<String>,
        not_configured: impl Into<String>,
    ) -> Self {
        self.unavailable_message = unavailable.into();
        self.not_configured_message = not_configured.into();
        self
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.chain
    }

    pub fn health(&self) -> &Arc<ProviderHealth> {
        &self.health
    }

    fn request_for(&self, entry: &ChainEntry, prompt: &str) -> ProviderRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(instruction) = &self.system_instruction {
            messages.push(Message::system(instruction.clone()));
        }
        messages.push(Message::user(prompt));

        let mut request = ProviderRequest::new(entry.model.clone(), messages);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request
    }

    /// Complete `prompt` against the first entry that answers.
    pub async fn complete(&self, prompt: &str) -> Completion {
        let configured: Vec<&ChainEntry> =
            self.chain.iter().filter(|e| e.is_configured()).collect();

        if configured.is_empty() {
            warn!("Gateway: no provider in the chain has credentials");
            return Completion {
                content: self.not_configured_message.clone(),
                source: CompletionSource::NotConfigured,
            };
        }

        let eligible: Vec<&ChainEntry> = configured
            .into_iter()
            .filter(|e| {
                let skip = e.premium && self.health.is_failed(&e.key());
                if skip {
                    debug!(entry = %e.key(), "Gateway: skipping premium entry flagged failed");
                }
                !skip
            })
            .collect();

        for (i, entry) in eligible.iter().enumerate() {
            let key = entry.key();

            info!(
                entry = %key,
                attempt = i + 1,
                total = eligible.len(),
                "Gateway: trying entry"
            );

            let outcome = match tokio::time::timeout(
                entry.timeout,
                entry.provider.complete(self.request_for(entry, prompt)),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(format!(
                    "'{}' timed out after {}ms",
                    key,
                    entry.timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(response) => {
                    let content = sanitize_reply(&response.message.content);
                    if content.is_empty() {
                        warn!(entry = %key, "Gateway: entry returned empty output, trying next");
                        continue;
                    }
                    if entry.premium {
                        self.health.mark_healthy(&key);
                    }
                    return Completion {
                        content,
                        source: CompletionSource::Provider {
                            provider: entry.provider.name().to_string(),
                            model: entry.model.clone(),
                        },
                    };
                }
                Err(e) => {
                    warn!(entry = %key, error = %e, "Gateway: entry failed, trying next");
                    if entry.premium {
                        self.health.mark_failed(&key);
                    }
                }
            }
        }

        warn!("Gateway: every entry in the chain failed");
        Completion {
            content: self.unavailable_message.clone(),
            source: CompletionSource::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::provider::ProviderResponse;
    use std::sync::Mutex;

    /// A scripted mock provider.
    struct MockProvider {
        name: String,
        reply: std::result::Result<String, ProviderError>,
        hang: bool,
        configured: bool,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl MockProvider {
        fn ok(name: &str, reply: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                reply: Ok(reply.into()),
                hang: false,
                configured: true,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(name: &str, error: ProviderError) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                reply: Err(error),
                hang: false,
                configured: true,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn hanging(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                reply: Ok(String::new()),
                hang: true,
                configured: true,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn unconfigured(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                reply: Ok("should not be called".into()),
                hang: false,
                configured: false,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            let model = request.model.clone();
            self.requests.lock().unwrap().push(request);
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.reply.clone().map(|content| ProviderResponse {
                message: Message::assistant(content),
                model,
            })
        }
    }

    fn gateway(entries: Vec<ChainEntry>) -> ModelGateway {
        entries.into_iter().fold(
            ModelGateway::new(Arc::new(ProviderHealth::new()))
                .with_fallback_messages("UNAVAILABLE", "NOT CONFIGURED"),
            |g, e| g.add(e),
        )
    }

    #[tokio::test]
    async fn first_entry_succeeds() {
        let p1 = MockProvider::ok("primary", "hello");
        let p2 = MockProvider::ok("secondary", "other");
        let gw = gateway(vec![
            ChainEntry::new(p1.clone(), "a"),
            ChainEntry::new(p2.clone(), "b"),
        ]);

        let completion = gw.complete("hi").await;
        assert_eq!(completion.content, "hello");
        assert_eq!(
            completion.source,
            CompletionSource::Provider {
                provider: "primary".into(),
                model: "a".into()
            }
        );
        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 0);
    }

    #[tokio::test]
    async fn sends_system_instruction_then_prompt() {
        let p = MockProvider::ok("p", "ok");
        let gw = gateway(vec![ChainEntry::new(p.clone(), "m")])
            .with_system_instruction("Be brief.")
            .with_sampling(0.2, Some(256));

        gw.complete("What do you sell?").await;

        let requests = p.requests.lock().unwrap();
        let req = &requests[0];
        assert_eq!(req.model, "m");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0], Message::system("Be brief."));
        assert_eq!(req.messages[1], Message::user("What do you sell?"));
        assert_eq!(req.max_tokens, Some(256));
    }

    #[tokio::test]
    async fn falls_back_on_error_and_rate_limit() {
        let p1 = MockProvider::failing(
            "primary",
            ProviderError::ApiError {
                status_code: 500,
                message: "Internal Server Error".into(),
            },
        );
        let p2 = MockProvider::failing("secondary", ProviderError::RateLimited { retry_after_secs: 60 });
        let p3 = MockProvider::ok("tertiary", "third time lucky");
        let gw = gateway(vec![
            ChainEntry::new(p1.clone(), "a"),
            ChainEntry::new(p2.clone(), "b"),
            ChainEntry::new(p3.clone(), "c"),
        ]);

        let completion = gw.complete("hi").await;
        assert_eq!(completion.content, "third time lucky");
        assert_eq!((p1.calls(), p2.calls(), p3.calls()), (1, 1, 1));
    }

    #[tokio::test]
    async fn premium_timeout_falls_back_and_is_skipped_next_time() {
        let premium = MockProvider::hanging("premium");
        let fallback = MockProvider::ok("fallback", "fallback reply");
        let gw = gateway(vec![
            ChainEntry::new(premium.clone(), "gpt-5-pro")
                .premium(true)
                .with_timeout(Duration::from_millis(50)),
            ChainEntry::new(fallback.clone(), "deepseek"),
        ]);

        let first = gw.complete("hi").await;
        assert_eq!(first.content, "fallback reply");
        assert!(gw.health().is_failed("premium/gpt-5-pro"));

        let second = gw.complete("hi again").await;
        assert_eq!(second.content, "fallback reply");
        assert_eq!(premium.calls(), 1);
        assert_eq!(fallback.calls(), 2);
    }

    #[tokio::test]
    async fn premium_success_clears_flag() {
        let premium = MockProvider::ok("premium", "premium reply");
        let gw = gateway(vec![ChainEntry::new(premium.clone(), "gpt-5-pro").premium(true)]);
        gw.health().mark_failed("premium/gpt-5-pro");

        // Flagged and alone in the chain: nothing eligible.
        let skipped = gw.complete("hi").await;
        assert_eq!(skipped.source, CompletionSource::Unavailable);
        assert_eq!(premium.calls(), 0);

        gw.health().mark_healthy("premium/gpt-5-pro");
        let answered = gw.complete("hi").await;
        assert_eq!(answered.content, "premium reply");
        assert!(!gw.health().is_failed("premium/gpt-5-pro"));
    }

    #[tokio::test]
    async fn non_premium_failure_is_not_flagged() {
        let p1 = MockProvider::failing("free", ProviderError::Network("down".into()));
        let gw = gateway(vec![ChainEntry::new(p1.clone(), "m")]);

        gw.complete("hi").await;
        gw.complete("hi").await;
        assert_eq!(p1.calls(), 2);
        assert!(gw.health().failed_keys().is_empty());
    }

    #[tokio::test]
    async fn empty_output_is_a_miss_without_flagging() {
        let premium = MockProvider::ok("premium", "<|endoftext|>\n\n\n");
        let fallback = MockProvider::ok("fallback", "real answer");
        let gw = gateway(vec![
            ChainEntry::new(premium.clone(), "p").premium(true),
            ChainEntry::new(fallback.clone(), "f"),
        ]);

        let completion = gw.complete("hi").await;
        assert_eq!(completion.content, "real answer");
        assert!(!gw.health().is_failed("premium/p"));
    }

    #[tokio::test]
    async fn output_is_sanitized() {
        let p = MockProvider::ok("p", "Hello\n\n\n\nWorld<|im_end|>  ");
        let gw = gateway(vec![ChainEntry::new(p, "m")]);
        assert_eq!(gw.complete("hi").await.content, "Hello\n\nWorld");
    }

    #[tokio::test]
    async fn all_entries_fail_returns_unavailable_message() {
        let p1 = MockProvider::failing("a", ProviderError::Network("conn refused".into()));
        let p2 = MockProvider::failing("b", ProviderError::AuthenticationFailed("bad key".into()));
        let gw = gateway(vec![ChainEntry::new(p1, "a"), ChainEntry::new(p2, "b")]);

        let completion = gw.complete("hi").await;
        assert_eq!(completion.content, "UNAVAILABLE");
        assert_eq!(completion.source, CompletionSource::Unavailable);
        assert!(!completion.is_generated());
    }

    #[tokio::test]
    async fn unconfigured_chain_returns_not_configured_without_calls() {
        let p = MockProvider::unconfigured("openrouter");
        let gw = gateway(vec![ChainEntry::new(p.clone(), "m")]);

        let completion = gw.complete("hi").await;
        assert_eq!(completion.content, "NOT CONFIGURED");
        assert_eq!(completion.source, CompletionSource::NotConfigured);
        assert_eq!(p.calls(), 0);
    }

    #[tokio::test]
    async fn empty_chain_returns_not_configured() {
        let gw = gateway(vec![]);
        assert!(gw.is_empty());
        assert_eq!(gw.complete("hi").await.source, CompletionSource::NotConfigured);
    }

    #[tokio::test]
    async fn unconfigured_entries_are_skipped() {
        let missing = MockProvider::unconfigured("openai");
        let present = MockProvider::ok("deepseek", "from deepseek");
        let gw = gateway(vec![
            ChainEntry::new(missing.clone(), "gpt"),
            ChainEntry::new(present, "deepseek-chat"),
        ]);

        assert_eq!(gw.complete("hi").await.content, "from deepseek");
        assert_eq!(missing.calls(), 0);
    }
}
