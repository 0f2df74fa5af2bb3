//! Built-in tool implementations for Jarvis.
//!
//! Tools give the assistant the ability to act on the world: look up the
//! weather and search the web. Each tool declares its parameters up front
//! so the prompt catalogue and argument validation stay in sync.

pub mod weather;
pub mod web_search;

use jarvis_config::ToolsConfig;
use jarvis_core::error::ToolError;
use jarvis_core::tool::{Tool, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use weather::WeatherTool;
pub use web_search::WebSearchTool;

/// Shared HTTP client for network-backed tools.
///
/// The client timeout sits just above the invoker's per-call timeout so the
/// invoker reports the timeout, not the HTTP layer.
pub fn http_client(config: &ToolsConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs + 1))
        .user_agent(concat!("jarvis/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Create a registry with every built-in tool not listed in `tools.disabled`.
pub fn default_registry(config: &ToolsConfig) -> Result<ToolRegistry, ToolError> {
    let client = http_client(config);
    let builtins: Vec<Arc<dyn Tool>> = vec![
        Arc::new(WeatherTool::new(
            client.clone(),
            &config.geocoding_url,
            &config.forecast_url,
        )),
        Arc::new(WebSearchTool::new(client, &config.search_url)),
    ];

    let mut registry = ToolRegistry::new();
    for tool in builtins {
        if !config.is_enabled(tool.name()) {
            info!(tool = tool.name(), "Tool disabled by configuration");
            continue;
        }
        registry.register(tool)?;
    }
    Ok(registry)
}
