//! `jarvis config`: configuration management commands.

use jarvis_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    if let Err(e) = config.validate() {
        println!("   ❌ {e}");
        return Err(e.into());
    }

    let mut warnings = Vec::new();
    if !config.has_api_key() && !config.is_local_provider() {
        warnings.push("No API key set (set OPENAI_API_KEY or OPENROUTER_API_KEY)".to_string());
    }
    for name in &config.tools.disabled {
        if !["weather", "search_web"].contains(&name.as_str()) {
            warnings.push(format!("tools.disabled names an unknown tool: {name}"));
        }
    }

    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Provider:  {}", config.default_provider);
    println!("   Model:     {}", config.default_model);
    println!("   Memory:    {}", if config.memory.enabled { "enabled" } else { "disabled" });

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    println!("{}", toml::to_string_pretty(&redacted(config))?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

/// Replace secrets so the config can be printed.
fn redacted(mut config: AppConfig) -> AppConfig {
    const MASK: &str = "***";
    if config.api_key.is_some() {
        config.api_key = Some(MASK.into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some(MASK.into());
        }
    }
    config
}
