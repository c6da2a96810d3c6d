//! # Harmonization Probe
//!
//! Sends one antigen name through cleaning, prompting, generation and
//! extraction, and prints every intermediate step.
//!
//! ## Usage
//!
//! ```
//! cargo run --bin test_harmonize_prompt -- "Anti-Vimentin"
//! cargo run --bin test_harmonize_prompt -- "CD3(2)" --show-prompt
//! ```
//!
//! Uses the same environment variables as the main binary (`LLM_TYPE`,
//! `OLLAMA_HOST`, `OLLAMA_PORT`, `HARMONIZE_MODEL`, `OPENAI_API_KEY`).

use antigen_harmonizer::antigen::extraction::{extract_structured, interpret_response};
use antigen_harmonizer::antigen::rules::clean;
use antigen_harmonizer::environment::HarmonizerConfig;
use antigen_harmonizer::llm::TextGenerator;
use antigen_harmonizer::prompt::antigen_harmonization_prompt;
use clap::Parser;
use serde_json::to_string_pretty;
use tokio::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[clap(about = "Send one antigen to the configured model and show the result")]
struct Args {
    /// Raw antigen name as it appears in the source metadata
    antigen: String,

    /// Print the full prompt before sending it
    #[clap(short = 'p', long)]
    show_prompt: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = HarmonizerConfig::from_env()?;
    let client = config.generation_client()?;

    let cleaned = clean(&args.antigen);
    info!("Raw: '{}' => cleaned: '{}'", args.antigen, cleaned);

    let prompt = antigen_harmonization_prompt(&cleaned);
    if args.show_prompt {
        println!("{}", prompt);
    }

    let start_time = Instant::now();
    let response = client.generate(&prompt).await?;
    info!("Response received in {:?}", start_time.elapsed());
    println!("Raw response:\n{}\n", response);

    match extract_structured(&response) {
        Ok(Some(value)) => println!("Extracted:\n{}\n", to_string_pretty(&value)?),
        Ok(None) => println!("No structured data found in response\n"),
        Err(e) => println!("Failed to decode structured data: {}\n", e),
    }

    let entry = interpret_response(&cleaned, &response);
    println!("Log entry:\n{}", to_string_pretty(&entry)?);

    Ok(())
}
