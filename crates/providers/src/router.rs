//! Provider router — builds providers and the gateway chain from config.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parley_config::AppConfig;
use parley_core::provider::Provider;
use tracing::warn;

use crate::gateway::{ChainEntry, ModelGateway};
use crate::health::ProviderHealth;
use crate::openai_compat::OpenAiCompatProvider;

/// Named provider instances shared by chain entries.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Build one provider per name referenced by the config.
pub fn build_router(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new();

    let names = config
        .models
        .iter()
        .map(|m| m.provider.as_str())
        .chain(config.providers.keys().map(|k| k.as_str()));

    for name in names {
        if router.get(name).is_some() {
            continue;
        }

        let Some(base_url) = config.api_url_for(name) else {
            warn!(provider = name, "No api_url for provider, skipping");
            continue;
        };
        let api_key = config.api_key_for(name).unwrap_or_default();

        let provider = OpenAiCompatProvider::new(name, base_url, api_key)
            .with_identity(config.referer_url.clone(), Some(config.app_title.clone()));

        router.register(name, Arc::new(provider));
    }

    router
}

/// Build the model gateway from configuration.
///
/// `health` is shared with any other gateway built for the same process.
pub fn build_from_config(config: &AppConfig, health: Arc<ProviderHealth>) -> ModelGateway {
    let router = build_router(config);
    let assistant = &config.assistant;

    let mut gateway = ModelGateway::new(health)
        .with_system_instruction(assistant.system_instruction.clone())
        .with_sampling(assistant.temperature, assistant.max_tokens)
        .with_fallback_messages(
            assistant.unavailable_message.clone(),
            assistant.not_configured_message.clone(),
        );

    for model in &config.models {
        if let Some(provider) = router.get(&model.provider) {
            gateway = gateway.add(
                ChainEntry::new(provider, model.model.clone())
                    .premium(model.premium)
                    .with_timeout(Duration::from_secs(model.timeout_secs)),
            );
        }
    }

    gateway
}
