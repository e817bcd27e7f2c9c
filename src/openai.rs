//! OpenAI-compatible client configuration with sensible defaults.
//!
//! Used for OpenAI itself and for providers exposing the same API (Mistral).

use crate::error::{DocqaError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Base URL of Mistral's OpenAI-compatible API.
pub const MISTRAL_API_BASE: &str = "https://api.mistral.ai/v1";

/// Create an OpenAI client using `OPENAI_API_KEY` and the default timeout.
pub fn create_client() -> Result<Client<OpenAIConfig>> {
    create_client_with(None, None, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client with an explicit key, API base and timeout.
///
/// `None` for the key falls back to `OPENAI_API_KEY`; `None` for the base
/// keeps the OpenAI endpoint.
pub fn create_client_with(
    api_key: Option<&str>,
    api_base: Option<&str>,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DocqaError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let mut config = OpenAIConfig::default();
    if let Some(key) = api_key {
        config = config.with_api_key(key);
    }
    if let Some(base) = api_base {
        config = config.with_api_base(base);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}

/// Read a non-empty API key from the environment.
pub fn api_key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}
