pub mod antigen;
pub mod environment;
pub mod export;
pub mod llm;
pub mod logging;
pub mod prompt;
pub mod report;
pub mod source;

use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use ollama_rs::Ollama;

pub const TARGET_LLM_REQUEST: &str = "llm_request";
pub const TARGET_REPORT: &str = "report";

#[derive(Clone, Debug)]
pub enum LLMClient {
    Ollama(Ollama),
    OpenAI(OpenAIClient<OpenAIConfig>),
}
