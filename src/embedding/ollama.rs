use super::{EmbeddingClient, EmbeddingError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Embeddings from a local Ollama runtime's `/api/embed` endpoint.
pub struct OllamaEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbeddingClient {
    /// Build a client for `model` served at `base_url`, expecting `dimension`-sized vectors.
    pub fn new(base_url: String, model: String, dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::Config(
                "embedding dimension must be greater than zero".into(),
            ));
        }
        let http = Client::builder()
            .user_agent("caution/embed")
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|error| EmbeddingError::Config(error.to_string()))?;
        Ok(Self {
            http,
            base_url,
            model,
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let endpoint = format!("{}/api/embed", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&endpoint)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|error| EmbeddingError::GenerationFailed(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let EmbedResponse { embeddings } = response
            .json()
            .await
            .map_err(|error| EmbeddingError::GenerationFailed(error.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::GenerationFailed(format!(
                "expected {} embeddings, received {}",
                texts.len(),
                embeddings.len()
            )));
        }
        if let Some(vector) = embeddings.iter().find(|vector| vector.len() != self.dimension) {
            return Err(EmbeddingError::Config(format!(
                "model {} produced {} dimensions, configured {}",
                self.model,
                vector.len(),
                self.dimension
            )));
        }

        tracing::debug!(model = %self.model, count = embeddings.len(), "Embeddings generated");
        Ok(embeddings)
    }
}
