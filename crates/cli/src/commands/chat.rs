//! `parley chat` — Interactive or single-message chat from the terminal.

use std::sync::Arc;

use parley_channels::CliChannel;
use parley_core::channel::Channel;

use crate::runtime;

pub async fn run(
    message: Option<String>,
    chat_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config()?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  WARNING: No API key configured, replies will be the fallback notice.");
        eprintln!("  Set OPENROUTER_API_KEY (or PARLEY_API_KEY), or add api_key to");
        eprintln!("    {}", parley_config::AppConfig::config_dir().join("config.toml").display());
        eprintln!();
    }

    let orchestrator = runtime::build_orchestrator(&config)?;
    let channel = match chat_id {
        Some(id) => CliChannel::with_chat_id(id),
        None => CliChannel::new(),
    };

    if let Some(text) = message {
        let msg = channel.message(&text);
        if orchestrator.handle(&msg, &channel).await.is_none() {
            eprintln!("  (no reply: message did not need one)");
        }
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║         Parley — Interactive Chat            ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Assistant:  {}", config.assistant.name);
    println!("  Chat id:    {}", channel.chat_id());
    println!("  Models:     {}", config.models.len());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let channel: Arc<dyn Channel> = Arc::new(channel);
    orchestrator.run(channel).await?;

    println!("\n  Goodbye! 👋\n");
    Ok(())
}
