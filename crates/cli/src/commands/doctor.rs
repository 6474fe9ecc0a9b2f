//! `parley doctor` — Diagnose configuration, knowledge and provider health.

use parley_config::AppConfig;
use parley_core::knowledge::KnowledgeSource;
use parley_core::provider::Provider;
use parley_memory::DirectoryKnowledgeSource;

use crate::runtime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Parley Doctor — Diagnostics");
    println!("==============================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file — using defaults (run `parley onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 blocking issue found.");
            return Ok(());
        }
    };

    if let Err(e) = runtime::build_store(&config) {
        println!("  ❌ {e}");
        issues += 1;
    } else if config.memory.backend == "file" {
        let dir = config.memory_dir();
        if dir.exists() {
            println!("  ✅ Memory directory exists: {}", dir.display());
        } else {
            println!("  ⚠️  Memory directory missing (created on first save): {}", dir.display());
        }
    }

    match DirectoryKnowledgeSource::new(config.knowledge_dir()).load_all().await {
        Ok(kb) if kb.is_empty() => {
            println!("  ⚠️  Knowledge directory is empty: {}", config.knowledge_dir().display());
            issues += 1;
        }
        Ok(kb) => {
            let topics: Vec<&str> = kb.iter().map(|(topic, _)| topic).collect();
            println!("  ✅ Knowledge loaded: {}", topics.join(", "));
        }
        Err(e) => {
            println!("  ⚠️  Knowledge unavailable: {e}");
            issues += 1;
        }
    }

    if !config.has_api_key() {
        println!("  ❌ No API key for any model — set OPENROUTER_API_KEY or api_key");
        issues += 1;
    }

    let router = parley_providers::router::build_router(&config);
    for name in router.list() {
        let Some(provider) = router.get(name) else { continue };
        if !provider.is_configured() {
            println!("  ⚠️  Provider {name}: no API key");
            continue;
        }
        match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider {name} reachable"),
            Ok(false) => {
                println!("  ❌ Provider {name} rejected the health check");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider {name} unreachable: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
