//! Drives each distinct cleaned antigen through prompt → generation →
//! extraction, once per distinct value, and collects the response log and the
//! cleaned → harmonized table.

use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::extraction::interpret_response;
use super::types::{FailureKind, HarmonizationFailure, HarmonizedTable, ResponseLogEntry};
use super::TARGET_ANTIGEN;
use crate::llm::TextGenerator;
use crate::prompt::antigen_harmonization_prompt;
use crate::TARGET_LLM_REQUEST;

/// What to do when the generation service itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportPolicy {
    /// Stop the run and return the error.
    #[default]
    Abort,
    /// Record a `transport` error entry and carry on.
    Skip,
}

#[derive(Debug, Clone)]
pub struct HarmonizeOptions {
    /// Maximum generation calls in flight. 1 means strictly sequential.
    pub concurrency: usize,
    pub call_timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub on_transport_error: TransportPolicy,
}

impl Default for HarmonizeOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            call_timeout: Duration::from_secs(120),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            on_transport_error: TransportPolicy::Abort,
        }
    }
}

/// Output of one harmonization pass.
#[derive(Debug, Clone, Default)]
pub struct HarmonizationRun {
    /// Every response, successful or not, sorted by cleaned antigen.
    pub responses: Vec<ResponseLogEntry>,
    pub table: HarmonizedTable,
}

impl HarmonizationRun {
    pub fn failure_counts(&self) -> HashMap<FailureKind, usize> {
        let mut counts = HashMap::new();
        for kind in self.responses.iter().filter_map(ResponseLogEntry::failure_kind) {
            *counts.entry(kind).or_insert(0) += 1;
        }
        counts
    }
}

enum GenerationFailure {
    Timeout,
    Transport(anyhow::Error),
}

pub struct Harmonizer<G> {
    generator: G,
    options: HarmonizeOptions,
}

impl<G: TextGenerator> Harmonizer<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            options: HarmonizeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: HarmonizeOptions) -> Self {
        self.options = options;
        self
    }

    /// Harmonize every distinct cleaned antigen. Duplicates in the input are
    /// collapsed first so each value reaches the generator exactly once.
    pub async fn harmonize_all<'a, I>(&self, cleaned: I) -> Result<HarmonizationRun>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let distinct: BTreeSet<&str> = cleaned.into_iter().map(String::as_str).collect();
        info!(
            target: TARGET_ANTIGEN,
            "Harmonizing {} distinct cleaned antigens (concurrency {})",
            distinct.len(),
            self.options.concurrency.max(1)
        );

        let mut responses: Vec<ResponseLogEntry> = stream::iter(distinct)
            .map(|antigen| self.harmonize_one(antigen))
            .buffer_unordered(self.options.concurrency.max(1))
            .try_collect()
            .await?;
        responses.sort_by(|a, b| a.cleaned_antigen().cmp(b.cleaned_antigen()));

        let table = HarmonizedTable::from_responses(&responses);
        let run = HarmonizationRun { responses, table };

        let failures = run.failure_counts();
        if !failures.is_empty() {
            warn!(target: TARGET_ANTIGEN, "Unharmonized antigens by reason: {:?}", failures);
        }
        info!(
            target: TARGET_ANTIGEN,
            "{} of {} cleaned antigens harmonized into {} names",
            run.table.len(),
            run.responses.len(),
            run.table.distinct_harmonized().len()
        );

        Ok(run)
    }

    /// Prompt, generate and extract for a single cleaned antigen. Only a
    /// transport failure under [`TransportPolicy::Abort`] returns `Err`.
    pub async fn harmonize_one(&self, cleaned: &str) -> Result<ResponseLogEntry> {
        let prompt = antigen_harmonization_prompt(cleaned);

        match self.generate_with_retry(cleaned, &prompt).await {
            Ok(response) => {
                let entry = interpret_response(cleaned, &response);
                if let Some(name) = entry.harmonized_name() {
                    debug!(target: TARGET_ANTIGEN, "'{}' => '{}'", cleaned, name);
                }
                Ok(entry)
            }
            Err(GenerationFailure::Timeout) => Ok(ResponseLogEntry::Failed(
                HarmonizationFailure::new(cleaned, "", FailureKind::Timeout).with_detail(format!(
                    "no response within {:?} after {} attempts",
                    self.options.call_timeout,
                    self.options.max_attempts.max(1)
                )),
            )),
            Err(GenerationFailure::Transport(e)) => match self.options.on_transport_error {
                TransportPolicy::Abort => {
                    Err(e.context(format!("generation failed for antigen '{}'", cleaned)))
                }
                TransportPolicy::Skip => {
                    warn!(target: TARGET_ANTIGEN, "Skipping '{}' after transport failure: {:#}", cleaned, e);
                    Ok(ResponseLogEntry::Failed(
                        HarmonizationFailure::new(cleaned, "", FailureKind::Transport)
                            .with_detail(format!("{:#}", e)),
                    ))
                }
            },
        }
    }

    async fn generate_with_retry(
        &self,
        cleaned: &str,
        prompt: &str,
    ) -> std::result::Result<String, GenerationFailure> {
        let max_attempts = self.options.max_attempts.max(1);
        let mut backoff = self.options.initial_backoff;
        let mut last_failure = GenerationFailure::Timeout;

        for attempt in 1..=max_attempts {
            match timeout(self.options.call_timeout, self.generator.generate(prompt)).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => {
                    warn!(target: TARGET_LLM_REQUEST, "'{}': error generating response: {:#}", cleaned, e);
                    last_failure = GenerationFailure::Transport(e);
                }
                Err(_) => {
                    warn!(target: TARGET_LLM_REQUEST, "'{}': LLM request timed out", cleaned);
                    last_failure = GenerationFailure::Timeout;
                }
            }

            if attempt < max_attempts {
                info!(target: TARGET_LLM_REQUEST, "'{}': retrying LLM request... ({}/{})", cleaned, attempt, max_attempts);
                sleep(backoff).await;
                backoff *= 2;
            } else {
                error!(target: TARGET_LLM_REQUEST, "'{}': failed to generate response after {} attempts", cleaned, max_attempts);
            }
        }

        Err(last_failure)
    }
}
