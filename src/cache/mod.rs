//! Document text cache keyed by document identity, with expiry.
//!
//! [`DocumentCache`] sits in front of a [`KvStore`] backend and owns the write policy: a put
//! whose value matches the stored value is a no-op and does not refresh the TTL; any other put
//! overwrites the value with a fresh TTL.

mod memory;
mod rest;

pub use memory::MemoryKvStore;
pub use rest::RestKvStore;

use crate::config::{CacheProvider, Config};
use crate::identity::DocumentId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend could not be reached or timed out; callers may retry.
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),
    /// Backend answered with something that does not follow its protocol.
    #[error("Cache protocol error: {0}")]
    Protocol(String),
    /// Backend was misconfigured at construction time.
    #[error("Cache configuration error: {0}")]
    Config(String),
}

/// Minimal key-value contract required from a cache backend.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a live value, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value that expires after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// Result of [`DocumentCache::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Value was written with a fresh TTL.
    Stored,
    /// Identical value already present; nothing was written.
    Unchanged,
}

impl PutOutcome {
    /// Short label used in HTTP responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Document text cache with a fixed TTL.
#[derive(Clone)]
pub struct DocumentCache {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl DocumentCache {
    /// Wrap a backend with the given TTL.
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Build the cache backend selected by configuration.
    pub fn from_config(config: &Config) -> Result<Self, CacheError> {
        let store: Arc<dyn KvStore> = match config.cache_provider {
            CacheProvider::Memory => Arc::new(MemoryKvStore::new()),
            CacheProvider::Rest => {
                let url = config
                    .cache_rest_url
                    .as_deref()
                    .ok_or_else(|| CacheError::Config("CACHE_REST_URL is not set".into()))?;
                let token = config
                    .cache_rest_token
                    .clone()
                    .ok_or_else(|| CacheError::Config("CACHE_REST_TOKEN is not set".into()))?;
                Arc::new(RestKvStore::new(url, token)?)
            }
        };
        tracing::info!(provider = ?config.cache_provider, ttl_secs = config.cache_ttl_secs, "Document cache ready");
        Ok(Self::new(store, config.cache_ttl()))
    }

    /// Store document text unless the identical text is already cached.
    pub async fn put(&self, id: &DocumentId, text: &str) -> Result<PutOutcome, CacheError> {
        if let Some(existing) = self.store.get(id.as_str()).await?
            && existing == text
        {
            tracing::debug!(document_id = %id, "Cached text unchanged; skipping write");
            return Ok(PutOutcome::Unchanged);
        }

        self.store.set(id.as_str(), text, self.ttl).await?;
        tracing::debug!(document_id = %id, bytes = text.len(), "Cached document text");
        Ok(PutOutcome::Stored)
    }

    /// Fetch cached document text.
    pub async fn get(&self, id: &DocumentId) -> Result<Option<String>, CacheError> {
        self.store.get(id.as_str()).await
    }
}
