//! `jarvis status`: show system status.

use jarvis_config::AppConfig;
use jarvis_core::memory::MemoryBackend;
use jarvis_memory::FileBackend;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    println!("Jarvis Status");
    println!("=============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Persona:      {} (addresses you as \"{}\")", config.persona.name, config.persona.title);
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.default_model);
    println!("  Temperature:  {}", config.default_temperature);
    println!("  API key:      {}", if config.has_api_key() { "configured" } else { "missing" });
    println!("  Budget:       {} tokens, {} history turns", config.context.token_budget, config.context.max_history_turns);
    println!("  Tool timeout: {}s", config.tools.timeout_secs);
    println!("  Narration:    {}", if config.tools.narrate_results { "enabled" } else { "disabled" });

    let router = jarvis_providers::build_from_config(&config);
    if let Some(provider) = router.default() {
        match provider.health_check().await {
            Ok(true) => {
                let models = provider.list_models().await.unwrap_or_default();
                println!("  Reachable:    yes ({} models listed)", models.len());
            }
            Ok(false) => println!("  Reachable:    no (endpoint rejected the request)"),
            Err(e) => println!("  Reachable:    no ({e})"),
        }
    }

    if config.memory.enabled {
        let backend = FileBackend::new(config.memory.resolved_path());
        let count = backend.count().await.unwrap_or(0);
        println!("  Memory:       {} ({count} entries)", backend.path().display());
    } else {
        println!("  Memory:       disabled");
    }

    if AppConfig::config_path().exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `jarvis onboard` first");
    }

    Ok(())
}
