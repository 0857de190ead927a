use super::{
    LanguageModel, LlmError, LlmRequest, LlmResponse, classify_status, classify_transport_error,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for OpenAI-compatible `chat/completions` endpoints (Groq, OpenAI).
pub struct ChatCompletionsClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl ChatCompletionsClient {
    /// Build a client for `base_url` (e.g. `https://api.groq.com/openai/v1`).
    pub fn new(base_url: String, api_key: String) -> Result<Self, LlmError> {
        let http = Client::builder()
            .user_agent("caution/llm")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|error| LlmError::Config(error.to_string()))?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for ChatCompletionsClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            return Err(classify_status(response).await);
        }

        let parsed: ChatResponse = response.json().await.map_err(|error| {
            LlmError::InvalidResponse(format!("failed to decode chat completion: {error}"))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("completion carried no choices".into()))?;

        tracing::trace!(model = %request.model, chars = content.len(), "Chat completion received");
        Ok(LlmResponse { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client(server: &MockServer) -> ChatCompletionsClient {
        ChatCompletionsClient::new(server.base_url(), "groq-key".into()).expect("client")
    }

    fn request() -> LlmRequest {
        LlmRequest {
            prompt: "Analyze this".into(),
            model: "llama-3.3-70b-versatile".into(),
        }
    }

    #[tokio::test]
    async fn extracts_first_choice_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer groq-key")
                    .json_body(json!({
                        "model": "llama-3.3-70b-versatile",
                        "messages": [{ "role": "user", "content": "Analyze this" }]
                    }));
                then.status(200).json_body(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "Data is shared." } }
                    ]
                }));
            })
            .await;

        let response = client(&server).complete(request()).await.expect("completion");

        mock.assert_async().await;
        assert_eq!(response.content, "Data is shared.");
    }

    #[tokio::test]
    async fn rate_limit_is_reported_distinctly() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(429).body("slow down");
            })
            .await;

        let error = client(&server).complete(request()).await.expect_err("429");
        assert!(matches!(error, LlmError::RateLimited(body) if body == "slow down"));
    }

    #[tokio::test]
    async fn empty_choices_are_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let error = client(&server).complete(request()).await.expect_err("no choices");
        assert!(matches!(error, LlmError::InvalidResponse(_)));
    }
}
