//! HTTP client wrapper for interacting with Qdrant.

use super::types::{
    CollectionInfoResponse, ListCollectionsResponse, StoredChunk, VectorError,
};
use crate::analysis::Chunk;
use reqwest::{Client, Method, StatusCode};
use serde_json::json;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Attempts made by [`QdrantService::ensure_collection`] before giving up.
pub const ENSURE_ATTEMPTS: u32 = 3;

const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(1);

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    retry_base: Duration,
}

impl QdrantService {
    /// Construct a client for the Qdrant instance at `url`.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, VectorError> {
        let client = Client::builder()
            .user_agent("caution/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;
        let base_url = normalize_base_url(url).map_err(VectorError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            retry_base: DEFAULT_RETRY_BASE,
        })
    }

    /// Override the base delay of the exponential backoff (`base * 2^attempt`).
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    /// Make sure `collection` exists with `vector_size`-dimensional cosine vectors.
    ///
    /// Transient failures are retried up to [`ENSURE_ATTEMPTS`] times with exponential
    /// backoff. A collection created for a different dimension fails immediately.
    pub async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> Result<(), VectorError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_ensure_collection(collection, vector_size).await {
                Ok(()) => return Ok(()),
                Err(error) if error.is_permanent() || attempt >= ENSURE_ATTEMPTS => {
                    tracing::error!(collection, attempt, error = %error, "Collection setup failed");
                    return Err(error);
                }
                Err(error) => {
                    let delay = self.retry_delay(attempt);
                    tracing::warn!(
                        collection,
                        attempt,
                        max_attempts = ENSURE_ATTEMPTS,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Collection setup failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base.saturating_mul(2u32.saturating_pow(attempt))
    }

    async fn try_ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> Result<(), VectorError> {
        if let Some(actual) = self.collection_vector_size(collection).await? {
            return check_dimension(collection, vector_size, actual);
        }

        tracing::debug!(collection, vector_size, "Creating collection");
        self.create_collection(collection, vector_size).await?;

        match self.collection_vector_size(collection).await? {
            Some(actual) => check_dimension(collection, vector_size, actual),
            None => Err(VectorError::Malformed(format!(
                "collection {collection} missing after creation"
            ))),
        }
    }

    async fn create_collection(&self, collection: &str, vector_size: u64) -> Result<(), VectorError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection}"))
            .json(&body)
            .send()
            .await?;

        // A concurrent creator may win the race; the follow-up lookup validates the result.
        if response.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        self.ensure_success(response, || {
            tracing::debug!(collection, "Collection created");
        })
        .await
    }

    /// Vector size of `collection`, or `None` when it does not exist.
    pub async fn collection_vector_size(&self, collection: &str) -> Result<Option<u64>, VectorError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let info: CollectionInfoResponse = response.json().await?;
                info.result.config.params.vector_size().map(Some).ok_or_else(|| {
                    VectorError::Malformed(format!("collection {collection} has no vector size"))
                })
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = VectorError::UnexpectedStatus { status, body };
                tracing::error!(collection, error = %error, "Collection lookup failed");
                Err(error)
            }
        }
    }

    /// Retrieve the names of all collections present in Qdrant.
    pub async fn list_collections(&self) -> Result<Vec<String>, VectorError> {
        let response = self.request(Method::GET, "collections").send().await?;

        if response.status().is_success() {
            let payload: ListCollectionsResponse = response.json().await?;
            Ok(payload
                .result
                .collections
                .into_iter()
                .map(|collection| collection.name)
                .collect())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Failed to list collections");
            Err(error)
        }
    }

    /// Store each chunk with its vector, keyed by chunk index so re-ingestion overwrites.
    ///
    /// Payload fields are `text`, `timestamp` (RFC 3339) and `chunkIndex`.
    pub async fn upsert_chunks(
        &self,
        collection: &str,
        chunks: &[Chunk],
        vectors: Vec<Vec<f32>>,
    ) -> Result<usize, VectorError> {
        if chunks.len() != vectors.len() {
            return Err(VectorError::Malformed(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if chunks.is_empty() {
            return Ok(0);
        }

        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string());
        let points: Vec<_> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                json!({
                    "id": chunk.index,
                    "vector": vector,
                    "payload": {
                        "text": chunk.text.trim(),
                        "timestamp": timestamp,
                        "chunkIndex": chunk.index,
                    },
                })
            })
            .collect();

        let count = points.len();
        let response = self
            .request(Method::PUT, &format!("collections/{collection}/points"))
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection, points = count, "Points upserted");
        })
        .await?;
        Ok(count)
    }

    /// Remove points left over from a longer previous version of the document.
    pub async fn delete_chunks_from(
        &self,
        collection: &str,
        first_stale_index: usize,
    ) -> Result<(), VectorError> {
        let body = json!({
            "filter": {
                "must": [
                    { "key": "chunkIndex", "range": { "gte": first_stale_index } }
                ]
            }
        });

        let response = self
            .request(Method::POST, &format!("collections/{collection}/points/delete"))
            .query(&[("wait", true)])
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection, first_stale_index, "Stale points removed");
        })
        .await
    }

    /// Read every stored chunk of `collection`, ordered by chunk index.
    pub async fn fetch_chunks(&self, collection: &str) -> Result<Vec<StoredChunk>, VectorError> {
        use futures_util::{StreamExt, pin_mut};

        let stream = super::scroller::stream_chunks(self, collection);
        pin_mut!(stream);
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk?);
        }
        chunks.sort_by_key(|chunk| chunk.index);
        Ok(chunks)
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), VectorError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

fn check_dimension(collection: &str, expected: u64, actual: u64) -> Result<(), VectorError> {
    if expected == actual {
        Ok(())
    } else {
        Err(VectorError::DimensionMismatch {
            collection: collection.to_string(),
            expected,
            actual,
        })
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
