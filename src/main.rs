use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use antigen_harmonizer::antigen::harmonizer::Harmonizer;
use antigen_harmonizer::antigen::rules::clean;
use antigen_harmonizer::antigen::{CleaningTable, TARGET_ANTIGEN};
use antigen_harmonizer::environment::HarmonizerConfig;
use antigen_harmonizer::export::{self, RunOutputs};
use antigen_harmonizer::logging::configure_logging;
use antigen_harmonizer::prompt::antigen_harmonization_prompt;
use antigen_harmonizer::{report, source};

#[derive(Parser, Debug)]
#[clap(about = "Harmonize free-text antigen names into gene names")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean, harmonize and report on a source table
    Run {
        /// Source table (.csv, .json or .jsonl)
        #[clap(short, long)]
        input: PathBuf,

        /// Directory for the output tables and response log
        #[clap(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Model name (overrides HARMONIZE_MODEL)
        #[clap(short, long)]
        model: Option<String>,

        /// Generation calls in flight (overrides HARMONIZE_CONCURRENCY)
        #[clap(short, long)]
        concurrency: Option<usize>,

        /// Per-call timeout in seconds (overrides HARMONIZE_TIMEOUT_SECS)
        #[clap(short, long)]
        timeout: Option<u64>,
    },
    /// Apply only the rule-based cleaning to the given names
    Clean {
        names: Vec<String>,
    },
    /// Print the harmonization prompt for one cleaned antigen
    Prompt {
        antigen: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Clean { names } => {
            for name in names {
                println!("{}\t{}", name, clean(&name));
            }
            Ok(())
        }
        Command::Prompt { antigen } => {
            println!("{}", antigen_harmonization_prompt(&antigen));
            Ok(())
        }
        Command::Run {
            input,
            output_dir,
            model,
            concurrency,
            timeout,
        } => {
            configure_logging();

            let mut config = HarmonizerConfig::from_env()?;
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(concurrency) = concurrency {
                config.options.concurrency = concurrency.max(1);
            }
            if let Some(timeout) = timeout {
                config.options.call_timeout = Duration::from_secs(timeout);
            }

            run(&config, &input, &output_dir).await
        }
    }
}

async fn run(config: &HarmonizerConfig, input: &Path, output_dir: &Path) -> Result<()> {
    let records = source::load_records(input)?;

    let cleaning = CleaningTable::from_records(&records);
    let cleaned = cleaning.distinct_cleaned();
    info!(
        target: TARGET_ANTIGEN,
        "{} unique antigens before manual cleaning, {} after",
        cleaning.raw_count(),
        cleaned.len()
    );

    let harmonizer =
        Harmonizer::new(config.generation_client()?).with_options(config.options.clone());
    let run = harmonizer.harmonize_all(&cleaned).await?;
    info!(
        target: TARGET_ANTIGEN,
        "{} antigens after LLM harmonization",
        run.table.distinct_harmonized().len()
    );

    let summaries = report::summarize_records(&records, &cleaning, &run.table);
    let counts = report::count_sources(&summaries);

    let outputs = RunOutputs {
        cleaned: &cleaned,
        responses: &run.responses,
        summaries: &summaries,
        counts: &counts,
    };
    for path in export::write_all(output_dir, &outputs)? {
        info!(target: TARGET_ANTIGEN, "Wrote {}", path.display());
    }

    Ok(())
}
