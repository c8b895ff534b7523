use anyhow::Result;
use providers::MentorClient;
use shared::agent_api::Transcript;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod config;
mod session;

const SUGGESTIONS: &str =
    "Try asking: \"What is a SIP?\", \"How do mutual funds work?\", or \"Tips for saving money\"";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let settings = config::load_settings()?;
    let client = Arc::new(MentorClient::from_settings(&settings)?);
    tracing::info!(endpoint = %client.endpoint(), "money mentor ready");

    let mut transcript = Transcript::with_greeting(settings.greeting.clone());
    println!("{}\n\n{}", settings.greeting, SUGGESTIONS);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        // EOF or Ctrl+C while idle
        let Some(line) = line else { break };
        let Some(input) = session::accept_input(&line) else {
            continue;
        };

        transcript.push_user(input);
        session::run_turn(&client, &mut transcript).await?;
    }

    println!();
    Ok(())
}
