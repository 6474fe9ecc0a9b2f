//! `parley onboard` — First-time setup.

use parley_config::AppConfig;

const SAMPLE_KNOWLEDGE: &str = "\
Replace this file with what the assistant should know about you.

Each file in this directory becomes one topic named after the file.
Files named shop, business or health are picked for messages about those
topics; everything else is used as general background.
";

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let config = AppConfig::default();

    println!("💬 Parley — First-Time Setup");
    println!("============================\n");

    for (label, dir) in [
        ("config", config_dir.clone()),
        ("memory", config.memory_dir()),
        ("knowledge", config.knowledge_dir()),
    ] {
        if dir.exists() {
            println!("  {label} directory exists: {}", dir.display());
        } else {
            tokio::fs::create_dir_all(&dir).await?;
            println!("✅ Created {label} directory: {}", dir.display());
        }
    }

    let sample_path = config.knowledge_dir().join("business.md");
    if !sample_path.exists() {
        tokio::fs::write(&sample_path, SAMPLE_KNOWLEDGE).await?;
        println!("✅ Created sample knowledge file: {}", sample_path.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        tokio::fs::write(&config_path, AppConfig::default_toml()).await?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Set OPENROUTER_API_KEY or add api_key to {}", config_path.display());
        println!("   2. Put your knowledge files in {}", config.knowledge_dir().display());
        println!("   3. Run: parley chat\n");
    }

    println!("🎉 Setup complete!\n");
    Ok(())
}
