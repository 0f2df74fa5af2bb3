pub mod chat;
pub mod config_cmd;
pub mod onboard;
pub mod status;
pub mod tools;

use jarvis_config::AppConfig;

/// Load the config or explain why it couldn't be.
pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}
