//! `parley status` — Show the effective configuration.

use parley_config::AppConfig;

use crate::runtime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config()?;

    println!("💬 Parley Status");
    println!("===============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Assistant:    {}", config.assistant.name);
    println!("  Memory:       {} ({})", config.memory.backend, config.memory_dir().display());
    println!("  Knowledge:    {}", config.knowledge_dir().display());
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "  Callback:     {}",
        config.webhook.callback_url.as_deref().unwrap_or("(none, replies are logged)")
    );
    println!(
        "  Signatures:   {}",
        if config.webhook.shared_secret.is_some() { "required" } else { "off" }
    );
    println!("  History:      {} turns", config.policy.history_limit);
    println!("  Follow-up:    {}s", config.policy.follow_up_window_secs);

    println!("\n  Model chain:");
    for (i, entry) in config.models.iter().enumerate() {
        let key = if config.api_key_for(&entry.provider).is_some() { "key" } else { "no key" };
        println!(
            "   {}. {}/{}{} [{key}, {}s]",
            i + 1,
            entry.provider,
            entry.model,
            if entry.premium { " (premium)" } else { "" },
            entry.timeout_secs,
        );
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `parley onboard` first");
    }

    Ok(())
}
