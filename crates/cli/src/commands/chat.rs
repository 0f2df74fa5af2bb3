//! `jarvis chat`: interactive or single-message conversation.

use chrono::Timelike;
use jarvis_agent::{Assistant, Session, SessionHandle};
use jarvis_config::AppConfig;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

const EXIT_COMMANDS: &[&str] = &["exit", "quit", ":q"];
const QUEUE_CAPACITY: usize = 16;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    config.validate()?;

    if !config.has_api_key() && !config.is_local_provider() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY=sk-...          (OpenAI)");
        eprintln!("    OPENROUTER_API_KEY=sk-or-...   (OpenRouter)");
        eprintln!("    JARVIS_API_KEY=...             (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = jarvis_providers::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;
    let registry = jarvis_tools::default_registry(&config.tools)?;
    let assistant = Arc::new(Assistant::from_config(&config, provider, registry));

    let hour = chrono::Local::now().hour();

    if let Some(msg) = message {
        let (mut session, _) = start_session(&assistant, false, hour).await;
        let reply = assistant.respond(&mut session, &msg).await;
        println!("{reply}");
        assistant.close_session(session).await;
        return Ok(());
    }

    let (session, greeting) = start_session(&assistant, true, hour).await;
    let greeting = greeting.unwrap_or_default();

    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Tools:     {}", assistant.registry().names().join(", "));
    println!("  Memories:  {} recalled", session.memories().len());
    println!();
    println!("  Type your message and press Enter. Type 'exit' to quit.");
    println!();
    print_reply(&assistant.persona().name, &greeting);

    let handle = SessionHandle::spawn(assistant.clone(), session, QUEUE_CAPACITY);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&input.to_lowercase().as_str()) {
            break;
        }

        match handle.send(input).await {
            Ok(reply) => print_reply(&assistant.persona().name, &reply),
            Err(e) => {
                warn!(error = %e, "Session stopped responding");
                break;
            }
        }
    }

    let saved = handle.close().await.unwrap_or(0);
    println!();
    println!("  Goodbye, {}. ({saved} exchanges remembered)", assistant.persona().title);
    println!();

    Ok(())
}

/// Open a session, greeting the user only when they will see it.
async fn start_session(assistant: &Assistant, interactive: bool, hour: u32) -> (Session, Option<String>) {
    let mut session = assistant.open_session().await;
    let greeting = interactive.then(|| assistant.greet(&mut session, hour));
    (session, greeting)
}

fn print_reply(name: &str, reply: &str) {
    println!();
    for line in reply.lines() {
        println!("  {name} > {line}");
    }
    println!();
}
