use anyhow::{bail, Context, Result};
use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use ollama_rs::Ollama;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::antigen::harmonizer::{HarmonizeOptions, TransportPolicy};
use crate::llm::GenerationClient;
use crate::{LLMClient, TARGET_LLM_REQUEST};

pub const DEFAULT_MODEL: &str = "llama3:70b-instruct";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost";
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// Retrieves an environment variable and parses it, falling back to `default`
/// when the variable is unset or unparseable.
pub fn get_env_var_or<T: FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LLMBackend {
    Ollama,
    OpenAI,
}

impl FromStr for LLMBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(LLMBackend::Ollama),
            "openai" => Ok(LLMBackend::OpenAI),
            other => bail!("Unknown LLM_TYPE '{}' (expected ollama or openai)", other),
        }
    }
}

impl FromStr for TransportPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(TransportPolicy::Abort),
            "skip" => Ok(TransportPolicy::Skip),
            other => bail!(
                "Unknown HARMONIZE_ON_TRANSPORT_ERROR '{}' (expected abort or skip)",
                other
            ),
        }
    }
}

/// Runtime configuration read from the environment.
#[derive(Debug, Clone)]
pub struct HarmonizerConfig {
    pub backend: LLMBackend,
    pub ollama_host: String,
    pub ollama_port: u16,
    pub openai_api_key: Option<String>,
    pub model: String,
    pub options: HarmonizeOptions,
}

impl HarmonizerConfig {
    pub fn from_env() -> Result<Self> {
        let backend = env::var("LLM_TYPE")
            .unwrap_or_else(|_| "ollama".to_string())
            .parse()?;
        let on_transport_error = env::var("HARMONIZE_ON_TRANSPORT_ERROR")
            .unwrap_or_else(|_| "abort".to_string())
            .parse()?;

        let defaults = HarmonizeOptions::default();
        let options = HarmonizeOptions {
            concurrency: get_env_var_or("HARMONIZE_CONCURRENCY", defaults.concurrency).max(1),
            call_timeout: Duration::from_secs(get_env_var_or(
                "HARMONIZE_TIMEOUT_SECS",
                defaults.call_timeout.as_secs(),
            )),
            max_attempts: get_env_var_or("HARMONIZE_MAX_RETRIES", defaults.max_attempts).max(1),
            initial_backoff: defaults.initial_backoff,
            on_transport_error,
        };

        Ok(Self {
            backend,
            ollama_host: env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string()),
            ollama_port: get_env_var_or("OLLAMA_PORT", DEFAULT_OLLAMA_PORT),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            model: env::var("HARMONIZE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            options,
        })
    }

    /// Build the generation client for the configured backend.
    pub fn generation_client(&self) -> Result<GenerationClient> {
        let llm_client = match self.backend {
            LLMBackend::OpenAI => {
                let api_key = self
                    .openai_api_key
                    .clone()
                    .context("OPENAI_API_KEY environment variable must be set")?;
                info!(target: TARGET_LLM_REQUEST, "Using OpenAI API with model {}", self.model);
                LLMClient::OpenAI(OpenAIClient::with_config(
                    OpenAIConfig::new().with_api_key(api_key),
                ))
            }
            LLMBackend::Ollama => {
                let host = if self.ollama_host.starts_with("http://")
                    || self.ollama_host.starts_with("https://")
                {
                    self.ollama_host.clone()
                } else {
                    format!("http://{}", self.ollama_host)
                };
                info!(
                    target: TARGET_LLM_REQUEST,
                    "Connecting to Ollama at {}:{} with model {}", host, self.ollama_port, self.model
                );
                LLMClient::Ollama(Ollama::new(host, self.ollama_port))
            }
        };

        Ok(GenerationClient::new(llm_client, self.model.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend() {
        assert_eq!("ollama".parse::<LLMBackend>().unwrap(), LLMBackend::Ollama);
        assert_eq!(" OpenAI ".parse::<LLMBackend>().unwrap(), LLMBackend::OpenAI);
        assert!("bedrock".parse::<LLMBackend>().is_err());
    }

    #[test]
    fn test_parse_transport_policy() {
        assert_eq!("skip".parse::<TransportPolicy>().unwrap(), TransportPolicy::Skip);
        assert_eq!("ABORT".parse::<TransportPolicy>().unwrap(), TransportPolicy::Abort);
        assert!("retry".parse::<TransportPolicy>().is_err());
    }

    #[test]
    fn test_get_env_var_or_default() {
        assert_eq!(
            get_env_var_or("ANTIGEN_HARMONIZER_TEST_UNSET_VARIABLE", 7usize),
            7
        );
    }

    #[test]
    fn test_openai_requires_key() {
        let config = HarmonizerConfig {
            backend: LLMBackend::OpenAI,
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            ollama_port: DEFAULT_OLLAMA_PORT,
            openai_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            options: HarmonizeOptions::default(),
        };
        assert!(config.generation_client().is_err());
    }
}
