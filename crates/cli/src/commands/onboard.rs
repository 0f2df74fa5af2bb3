//! `jarvis onboard`: first-time setup.

use jarvis_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = AppConfig::config_path();
    let memory_dir = config_dir.join("memory");

    println!("Jarvis — First-Time Setup");
    println!("=========================\n");

    for dir in [&config_dir, &memory_dir] {
        if dir.exists() {
            println!("  Directory exists: {}", dir.display());
        } else {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created directory: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Set OPENAI_API_KEY (or add api_key to {})", config_path.display());
        println!("   2. Run: jarvis chat\n");
    }

    println!("🎉 Setup complete! Run `jarvis chat` to start.\n");

    Ok(())
}
