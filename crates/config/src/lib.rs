//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Sent as `HTTP-Referer` to providers that rank apps by referrer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer_url: Option<String>,

    /// Sent as `X-Title` to identify the app to providers
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// Persona and fixed replies
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Reply policy: gate, history, budgets, keyword lists
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Ordered model chain tried by the gateway
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Conversation memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Knowledge store configuration
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Webhook channel configuration
    #[serde(default)]
    pub webhook: WebhookConfig,
}

fn default_app_title() -> String {
    "parley".into()
}

fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            provider: "openrouter".into(),
            model: "openai/gpt-5-pro".into(),
            premium: true,
            timeout_secs: default_timeout_secs(),
        },
        ModelConfig {
            provider: "openrouter".into(),
            model: "deepseek/deepseek-chat-v3.1:free".into(),
            premium: false,
            timeout_secs: default_timeout_secs(),
        },
    ]
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("referer_url", &self.referer_url)
            .field("app_title", &self.app_title)
            .field("assistant", &self.assistant)
            .field("policy", &self.policy)
            .field("models", &self.models)
            .field("providers", &self.providers)
            .field("memory", &self.memory)
            .field("knowledge", &self.knowledge)
            .field("gateway", &self.gateway)
            .field("webhook", &self.webhook)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("shared_secret", &redact(&self.shared_secret))
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

/// Persona, instructions, and the fixed user-facing fallback replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Display name used in the persona prompt
    #[serde(default = "default_assistant_name")]
    pub name: String,

    /// System turn prepended to every provider request
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,

    /// Persona preamble placed at the top of the user prompt
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Reply when every provider in the chain failed
    #[serde(default = "default_unavailable_message")]
    pub unavailable_message: String,

    /// Reply when no provider has an API key
    #[serde(default = "default_not_configured_message")]
    pub not_configured_message: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_assistant_name() -> String {
    "Parley".into()
}
fn default_system_instruction() -> String {
    "You are an intelligent WhatsApp assistant: helpful, concise, and professional. \
     Reply in clean plain text and never include special tokens or irrelevant metadata."
        .into()
}
fn default_persona() -> String {
    "You are a friendly personal assistant for a small business. Answer using the \
     knowledge provided when it is relevant, keep replies short enough for a chat \
     message, and say so honestly when you do not know."
        .into()
}
fn default_unavailable_message() -> String {
    "⚠️ Sorry, all models are currently unavailable. Please try again later.".into()
}
fn default_not_configured_message() -> String {
    "⚠️ The assistant is not configured yet. Please set an API key.".into()
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            system_instruction: default_system_instruction(),
            persona: default_persona(),
            unavailable_message: default_unavailable_message(),
            not_configured_message: default_not_configured_message(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Tunable reply policy. Values are product tuning, not structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Turns kept per conversation
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// A conversation is mid-session for this long after the last user turn
    #[serde(default = "default_follow_up_window_secs")]
    pub follow_up_window_secs: u64,

    /// Max characters of knowledge injected into a prompt
    #[serde(default = "default_knowledge_char_budget")]
    pub knowledge_char_budget: usize,

    /// Max characters of rendered history injected into a prompt
    #[serde(default = "default_context_char_budget")]
    pub context_char_budget: usize,

    #[serde(default = "default_greetings")]
    pub greetings: Vec<String>,

    #[serde(default = "default_question_keywords")]
    pub question_keywords: Vec<String>,

    /// Chats whose id ends with one of these are never answered
    #[serde(default = "default_ignored_chat_suffixes")]
    pub ignored_chat_suffixes: Vec<String>,

    /// Keyword lists for intent classification
    #[serde(default)]
    pub topics: TopicKeywords,
}

fn default_history_limit() -> usize {
    10
}
fn default_follow_up_window_secs() -> u64 {
    5 * 60
}
fn default_knowledge_char_budget() -> usize {
    4000
}
fn default_context_char_budget() -> usize {
    2000
}
fn default_greetings() -> Vec<String> {
    [
        "hi", "hello", "hey", "hola", "howdy", "greetings", "good morning",
        "good afternoon", "good evening", "habari", "jambo", "mambo", "niaje",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_question_keywords() -> Vec<String> {
    [
        "what", "how", "where", "price", "buy", "cost", "available", "who", "when", "why",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_ignored_chat_suffixes() -> Vec<String> {
    vec!["@broadcast".into()]
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            follow_up_window_secs: default_follow_up_window_secs(),
            knowledge_char_budget: default_knowledge_char_budget(),
            context_char_budget: default_context_char_budget(),
            greetings: default_greetings(),
            question_keywords: default_question_keywords(),
            ignored_chat_suffixes: default_ignored_chat_suffixes(),
            topics: TopicKeywords::default(),
        }
    }
}

/// Keyword sets per topic. Priority is fixed: shop, business, health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicKeywords {
    #[serde(default = "default_shop_keywords")]
    pub shop: Vec<String>,

    #[serde(default = "default_business_keywords")]
    pub business: Vec<String>,

    #[serde(default = "default_health_keywords")]
    pub health: Vec<String>,
}

fn default_shop_keywords() -> Vec<String> {
    ["price", "shop", "buy", "product"].into_iter().map(String::from).collect()
}
fn default_business_keywords() -> Vec<String> {
    ["nurutech", "website", "app", "automation"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_health_keywords() -> Vec<String> {
    ["health", "remedy", "natural", "disease"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for TopicKeywords {
    fn default() -> Self {
        Self {
            shop: default_shop_keywords(),
            business: default_business_keywords(),
            health: default_health_keywords(),
        }
    }
}

/// One entry of the gateway's fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Key into `providers` (or a well-known provider name)
    #[serde(default = "default_chain_provider")]
    pub provider: String,

    /// Model identifier sent in the request body
    pub model: String,

    /// Premium entries are skipped after a failure until one succeeds again
    #[serde(default)]
    pub premium: bool,

    /// Per-attempt timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_chain_provider() -> String {
    "openrouter".into()
}
fn default_timeout_secs() -> u64 {
    12
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "file" or "in_memory"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Directory holding one JSON record per conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_memory_backend() -> String {
    "file".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory of topic-named text/JSON files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// HMAC shared secret for inbound signature validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_secret: Option<String>,

    /// Where outbound replies are POSTed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Also checks environment variables:
    /// - `PARLEY_API_KEY` (highest priority), then `OPENROUTER_API_KEY`
    /// - `DEEPSEEK_API_KEY` for `[providers.deepseek]` when it has no key
    /// - `REFERER_URL`, `APP_TITLE`
    /// - `PARLEY_MEMORY_DIR`, `PARLEY_KNOWLEDGE_DIR`
    /// - `PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = var("PARLEY_API_KEY").or_else(|| var("OPENROUTER_API_KEY"));
        }
        if let Some(key) = var("DEEPSEEK_API_KEY") {
            let deepseek = self.providers.entry("deepseek".into()).or_default();
            if deepseek.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
                deepseek.api_key = Some(key);
            }
        }
        if let Some(referer) = var("REFERER_URL") {
            self.referer_url = Some(referer);
        }
        if let Some(title) = var("APP_TITLE") {
            self.app_title = title;
        }
        if let Some(dir) = var("PARLEY_MEMORY_DIR") {
            self.memory.dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = var("PARLEY_KNOWLEDGE_DIR") {
            self.knowledge.dir = Some(PathBuf::from(dir));
        }
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Directory of per-conversation memory records.
    pub fn memory_dir(&self) -> PathBuf {
        self.memory
            .dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("memory"))
    }

    /// Directory of knowledge files.
    pub fn knowledge_dir(&self) -> PathBuf {
        self.knowledge
            .dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("knowledge"))
    }

    /// Resolve the API key for a provider: per-provider key, then the global one.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }

    /// Base URL for a provider: `[providers.<name>].api_url`, then the
    /// well-known default. `None` for an unknown provider without a URL.
    pub fn api_url_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_url.clone())
            .filter(|u| !u.trim().is_empty())
            .or_else(|| default_api_url(provider).map(String::from))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [[models]] entry is required".into(),
            ));
        }

        let providers = self
            .models
            .iter()
            .map(|m| m.provider.as_str())
            .chain(self.providers.keys().map(|k| k.as_str()));
        for provider in providers {
            if self.api_url_for(provider).is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "provider '{provider}' is not a known provider; set [providers.{provider}] api_url"
                )));
            }
        }

        if let Some(entry) = self.models.iter().find(|m| m.timeout_secs == 0) {
            return Err(ConfigError::ValidationError(format!(
                "timeout_secs for model '{}' must be > 0",
                entry.model
            )));
        }

        if self.policy.history_limit < 2 {
            return Err(ConfigError::ValidationError(
                "policy.history_limit must be at least 2".into(),
            ));
        }

        if self.policy.knowledge_char_budget == 0 || self.policy.context_char_budget == 0 {
            return Err(ConfigError::ValidationError(
                "policy char budgets must be > 0".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.assistant.temperature) {
            return Err(ConfigError::ValidationError(
                "assistant.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        Ok(())
    }

    /// Check if any API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.models
            .iter()
            .any(|m| self.api_key_for(&m.provider).is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            referer_url: None,
            app_title: default_app_title(),
            assistant: AssistantConfig::default(),
            policy: PolicyConfig::default(),
            models: default_models(),
            providers: HashMap::new(),
            memory: MemoryConfig::default(),
            knowledge: KnowledgeConfig::default(),
            gateway: GatewayConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

/// Get the user's home directory.
/// Chat-completions base URL of well-known OpenAI-compatible providers.
pub fn default_api_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "openai" => Some("https://api.openai.com/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        _ => None,
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
