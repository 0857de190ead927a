//! Redis reached through an Upstash-compatible REST interface.

use super::{CacheError, KvStore};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// [`KvStore`] backed by Redis over HTTP.
///
/// `GET {base}/get/{key}` reads a value and `POST {base}/set/{key}?EX={secs}` writes one with the
/// raw value as request body. Keys are percent-encoded exactly once, as a single path segment.
pub struct RestKvStore {
    http: Client,
    base_url: Url,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl RestKvStore {
    /// Build a client for the given endpoint and bearer token.
    pub fn new(base_url: &str, token: String) -> Result<Self, CacheError> {
        let base_url = Url::parse(base_url)
            .map_err(|error| CacheError::Config(format!("invalid cache URL {base_url}: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CacheError::Config(format!(
                "cache URL {base_url} cannot carry a path"
            )));
        }
        let http = Client::builder()
            .user_agent("caution/cache")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| CacheError::Config(error.to_string()))?;
        tracing::debug!(url = %base_url, "Initialized REST cache client");
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    fn command_url(&self, command: &str, key: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(command).push(key);
        }
        url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<RestReply, CacheError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|error| CacheError::Unavailable(error.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(CacheError::Unavailable(format!("{status}: {body}")));
        }

        let reply: RestReply = response
            .json()
            .await
            .map_err(|error| CacheError::Protocol(format!("undecodable reply ({status}): {error}")))?;

        if let Some(error) = reply.error.as_ref() {
            return Err(CacheError::Protocol(format!("{status}: {error}")));
        }
        if !status.is_success() {
            return Err(CacheError::Protocol(format!("unexpected status {status}")));
        }
        Ok(reply)
    }
}

#[async_trait]
impl KvStore for RestKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let reply = self.send(self.http.get(self.command_url("get", key))).await?;
        match reply.result {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(value)) => Ok(Some(value)),
            Some(other) => Err(CacheError::Protocol(format!(
                "expected string value, got {other}"
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let ttl_secs = ttl.as_secs().max(1).to_string();
        let request = self
            .http
            .post(self.command_url("set", key))
            .query(&[("EX", ttl_secs.as_str())])
            .body(value.to_string());
        let reply = self.send(request).await?;
        match reply.result {
            Some(serde_json::Value::String(ok)) if ok == "OK" => {
                tracing::trace!(key, "REST cache write acknowledged");
                Ok(())
            }
            other => Err(CacheError::Protocol(format!(
                "unexpected SET reply: {other:?}"
            ))),
        }
    }
}
