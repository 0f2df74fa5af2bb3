//! `jarvis tools`: show the tool catalogue.

use jarvis_agent::context::assembler::render_catalogue;

pub async fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let registry = jarvis_tools::default_registry(&config.tools)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
    } else {
        println!("{}", render_catalogue(&registry));
        if !config.tools.disabled.is_empty() {
            println!("\nDisabled: {}", config.tools.disabled.join(", "));
        }
    }
    Ok(())
}
