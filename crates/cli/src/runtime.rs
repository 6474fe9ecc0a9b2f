//! Wires configuration into a ready-to-run orchestrator.

use std::sync::Arc;

use parley_agent::Orchestrator;
use parley_config::AppConfig;
use parley_core::memory::ConversationStore;
use parley_memory::{
    DirectoryKnowledgeSource, FileConversationStore, InMemoryConversationStore, KnowledgeIndex,
};
use parley_providers::{ModelGateway, ProviderHealth};
use tracing::info;

/// Load config from `~/.parley/config.toml` plus environment overrides.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Conversation store selected by `memory.backend`.
pub fn build_store(config: &AppConfig) -> Result<Arc<dyn ConversationStore>, String> {
    match config.memory.backend.as_str() {
        "file" => Ok(Arc::new(FileConversationStore::new(config.memory_dir()))),
        "memory" | "in_memory" => Ok(Arc::new(InMemoryConversationStore::new())),
        other => Err(format!(
            "Unknown memory backend '{other}' (expected \"file\" or \"memory\")"
        )),
    }
}

pub fn build_gateway(config: &AppConfig) -> ModelGateway {
    parley_providers::build_from_config(config, Arc::new(ProviderHealth::new()))
}

pub fn build_knowledge(config: &AppConfig) -> Arc<KnowledgeIndex> {
    Arc::new(KnowledgeIndex::new(Arc::new(DirectoryKnowledgeSource::new(
        config.knowledge_dir(),
    ))))
}

/// Build the full reply pipeline from `config`.
pub fn build_orchestrator(config: &AppConfig) -> Result<Arc<Orchestrator>, String> {
    let store = build_store(config)?;
    let gateway = build_gateway(config);

    info!(
        backend = %config.memory.backend,
        knowledge = %config.knowledge_dir().display(),
        models = gateway.len(),
        "Pipeline ready"
    );

    Ok(Arc::new(Orchestrator::from_config(
        config,
        store,
        build_knowledge(config),
        Arc::new(gateway),
    )))
}
