use super::{
    LanguageModel, LlmError, LlmRequest, LlmResponse, classify_status, classify_transport_error,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

/// Client for a local Ollama runtime's `/api/generate` endpoint.
pub struct OllamaClient {
    http: Client,
    base_url: String,
}

impl OllamaClient {
    /// Build a client for the runtime at `base_url`.
    pub fn new(base_url: String) -> Result<Self, LlmError> {
        let http = Client::builder()
            .user_agent("caution/ollama")
            .build()
            .map_err(|error| LlmError::Config(error.to_string()))?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": 0.1,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LlmError::Unavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            return Err(classify_status(response).await);
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            LlmError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(LlmError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(LlmResponse {
            content: body.response.trim().to_string(),
        })
    }
}
