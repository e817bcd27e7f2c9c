//! Chat completion generator for OpenAI and OpenAI-compatible APIs.

use super::{Generator, Prompt};
use crate::error::{DocqaError, Result};
use crate::openai::{create_client_with, MISTRAL_API_BASE};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default OpenAI chat model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Default Mistral chat model.
pub const DEFAULT_MISTRAL_MODEL: &str = "mistral-small-latest";

/// Generator backed by a chat completions endpoint.
pub struct OpenAIGenerator {
    client: Client<OpenAIConfig>,
    provider: &'static str,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIGenerator {
    /// Create a generator for OpenAI using `OPENAI_API_KEY`.
    pub fn new(model: &str, timeout: Duration) -> Result<Self> {
        let client = create_client_with(None, None, timeout)?;
        Ok(Self::with_client(client, "openai", model))
    }

    /// Create a generator for Mistral's OpenAI-compatible API.
    pub fn mistral(api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = create_client_with(Some(api_key), Some(MISTRAL_API_BASE), timeout)?;
        Ok(Self::with_client(client, "mistral", model))
    }

    /// Create a generator from an existing client.
    pub fn with_client(client: Client<OpenAIConfig>, provider: &'static str, model: &str) -> Self {
        Self {
            client,
            provider,
            model: model.to_string(),
            temperature: 0.7,
            max_tokens: 500,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn messages(prompt: &Prompt) -> Result<Vec<ChatCompletionRequestMessage>> {
        Ok(vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system.clone())
                .build()
                .map_err(|e| DocqaError::Generation(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.user.clone())
                .build()
                .map_err(|e| DocqaError::Generation(e.to_string()))?
                .into(),
        ])
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip(self, prompt), fields(provider = self.provider, model = %self.model))]
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        #[allow(deprecated)]
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::messages(prompt)?)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| DocqaError::Generation(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            DocqaError::Generation(format!("Failed to generate response: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        debug!("Completion of {} chars", answer.len());
        Ok(answer)
    }

    fn name(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}
