//! Language-model collaborator used for chunk analysis and summaries.
//!
//! Every call site treats the model as slow and fail-prone; the trait only reports what went
//! wrong and leaves the fallback policy to the caller.

mod chat;
mod ollama;

pub use chat::ChatCompletionsClient;
pub use ollama::OllamaClient;

use crate::config::{Config, LlmProvider};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_GROQ_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Errors surfaced by language-model providers.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider was unreachable or the request timed out.
    #[error("Language model unavailable: {0}")]
    Unavailable(String),
    /// Provider throttled the request.
    #[error("Language model rate limited: {0}")]
    RateLimited(String),
    /// Provider answered with a non-success status.
    #[error("Language model returned {status}: {body}")]
    Status {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Response body captured for diagnostics.
        body: String,
    },
    /// Provider response could not be decoded or carried no content.
    #[error("Malformed language model response: {0}")]
    InvalidResponse(String),
    /// Client could not be constructed from configuration.
    #[error("Language model configuration error: {0}")]
    Config(String),
}

/// Prompt sent to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    /// Fully assembled prompt text.
    pub prompt: String,
    /// Provider-specific model identifier.
    pub model: String,
}

/// Textual content extracted from a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    /// Generated text.
    pub content: String,
}

/// Interface implemented by language-model providers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run a single-turn completion.
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;
}

/// Build the provider selected by configuration.
///
/// Hosted providers without an API key fail here, at startup, rather than on first use.
pub fn language_model_from_config(config: &Config) -> Result<Arc<dyn LanguageModel>, LlmError> {
    let model: Arc<dyn LanguageModel> = match config.llm_provider {
        LlmProvider::Groq | LlmProvider::OpenAI => {
            let api_key = config
                .llm_api_key
                .clone()
                .ok_or_else(|| LlmError::Config("LLM_API_KEY is not set".into()))?;
            let default_url = if config.llm_provider == LlmProvider::Groq {
                DEFAULT_GROQ_URL
            } else {
                DEFAULT_OPENAI_URL
            };
            let base_url = config
                .llm_base_url
                .clone()
                .unwrap_or_else(|| default_url.to_string());
            Arc::new(ChatCompletionsClient::new(base_url, api_key)?)
        }
        LlmProvider::Ollama => {
            let base_url = config
                .llm_base_url
                .clone()
                .or_else(|| config.ollama_url.clone())
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            Arc::new(OllamaClient::new(base_url)?)
        }
    };
    tracing::info!(provider = ?config.llm_provider, "Language model client initialized");
    Ok(model)
}

pub(crate) fn classify_transport_error(error: reqwest::Error) -> LlmError {
    if error.is_decode() {
        LlmError::InvalidResponse(error.to_string())
    } else {
        LlmError::Unavailable(error.to_string())
    }
}

pub(crate) async fn classify_status(response: reqwest::Response) -> LlmError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited(body)
    } else {
        LlmError::Status {
            status: status.as_u16(),
            body,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn hosted_provider_without_key_fails_fast() {
        let mut config = test_config();
        config.llm_provider = LlmProvider::Groq;
        config.llm_api_key = None;
        let error = language_model_from_config(&config).err().expect("config error");
        assert!(matches!(error, LlmError::Config(_)));
    }

    #[test]
    fn ollama_provider_builds_without_key() {
        let config = test_config();
        assert!(language_model_from_config(&config).is_ok());
    }
}
