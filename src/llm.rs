use anyhow::{anyhow, Context, Result};
use async_openai::types::{
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::options::GenerationOptions;
use std::future::Future;
use tracing::debug;

use crate::{LLMClient, TARGET_LLM_REQUEST};

// Fixed decoding configuration. top_p has no effect at temperature 0 but is
// still sent.
pub const TEMPERATURE: f32 = 0.0;
pub const TOP_P: f32 = 0.9;
pub const MAX_GENERATED_TOKENS: u32 = 2048;

// Passes the already framed prompt through Ollama untouched.
const RAW_TEMPLATE: &str = "{{ .Prompt }}";

/// Anything that can turn a prompt into generated text.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Wrap a user message in the Llama 3 chat framing.
pub fn llama3_chat_prompt(user_message: &str) -> String {
    format!(
        "<|begin_of_text|><|start_header_id|>user<|end_header_id|>\n\n{}<|eot_id|><|start_header_id|>assistant<|end_header_id|>\n\n",
        user_message
    )
}

/// Single request/response exchange with the configured generation service.
/// Transport errors are returned to the caller as-is.
#[derive(Clone, Debug)]
pub struct GenerationClient {
    pub llm_client: LLMClient,
    pub model: String,
}

impl GenerationClient {
    pub fn new(llm_client: LLMClient, model: impl Into<String>) -> Self {
        Self {
            llm_client,
            model: model.into(),
        }
    }

    pub fn connection_info(&self) -> String {
        match &self.llm_client {
            LLMClient::Ollama(_) => format!("ollama ({})", self.model),
            LLMClient::OpenAI(_) => format!("OpenAI API ({})", self.model),
        }
    }

    /// Ollama request for `prompt`, framed for Llama 3 with the fixed decoding
    /// configuration.
    pub fn ollama_request(&self, prompt: &str) -> GenerationRequest {
        let mut request = GenerationRequest::new(self.model.clone(), llama3_chat_prompt(prompt));
        request.template = Some(RAW_TEMPLATE.into());
        request.options = Some(
            GenerationOptions::default()
                .temperature(TEMPERATURE)
                .top_p(TOP_P)
                .num_predict(MAX_GENERATED_TOKENS as i32),
        );
        request
    }

    /// OpenAI chat completion request carrying `prompt` as the only user
    /// message.
    pub fn openai_request(&self, prompt: &str) -> Result<CreateChatCompletionRequest> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into()])
            .temperature(TEMPERATURE)
            .top_p(TOP_P)
            .max_completion_tokens(MAX_GENERATED_TOKENS)
            .build()?;
        Ok(request)
    }

    async fn generate_ollama(&self, ollama: &ollama_rs::Ollama, prompt: &str) -> Result<String> {
        let response = ollama
            .generate(self.ollama_request(prompt))
            .await
            .map_err(|e| anyhow!("Ollama generation failed: {}", e))?;
        Ok(response.response)
    }

    async fn generate_openai(
        &self,
        client: &async_openai::Client<async_openai::config::OpenAIConfig>,
        prompt: &str,
    ) -> Result<String> {
        let request = self.openai_request(prompt)?;

        let response = client
            .chat()
            .create(request)
            .await
            .context("OpenAI chat completion failed")?;

        if let Some(usage) = &response.usage {
            debug!(
                target: TARGET_LLM_REQUEST,
                "Prompt tokens: {}, completion tokens: {}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("OpenAI response contained no message content"))
    }
}

impl TextGenerator for GenerationClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(target: TARGET_LLM_REQUEST, "[{}]: sending prompt: {}", self.connection_info(), prompt);

        let text = match &self.llm_client {
            LLMClient::Ollama(ollama) => self.generate_ollama(ollama, prompt).await?,
            LLMClient::OpenAI(client) => self.generate_openai(client, prompt).await?,
        };

        debug!(target: TARGET_LLM_REQUEST, "[{}]: received response: {}", self.connection_info(), text);
        Ok(text)
    }
}
