//! Service facade shared by the HTTP surface and the CLI.

use crate::analysis::{AnalysisOutcome, AnalysisPipeline, PipelineError};
use crate::cache::{CacheError, DocumentCache, PutOutcome};
use crate::config::Config;
use crate::identity::DocumentId;
use crate::llm::{LlmError, language_model_from_config};
use crate::results::{ResultStoreError, SqliteResultStore};
use crate::vector::{ContextStore, VectorError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced to callers of [`CautionApi`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Document cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// Analysis pipeline failed outside its degrade paths.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ServiceError {
    /// Whether the failure is an infrastructure outage that a retry may fix.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Cache(CacheError::Unavailable(_))
                | Self::Pipeline(PipelineError::Results(ResultStoreError::Unavailable(_)))
        )
    }
}

/// Errors raised while wiring collaborators at startup.
#[derive(Debug, Error)]
pub enum InitError {
    /// Cache backend could not be constructed.
    #[error("Failed to initialize document cache: {0}")]
    Cache(#[from] CacheError),
    /// Result database could not be opened.
    #[error("Failed to open result store: {0}")]
    Results(#[from] ResultStoreError),
    /// Language model client could not be constructed.
    #[error("Failed to initialize language model: {0}")]
    Llm(#[from] LlmError),
    /// Vector context store could not be constructed.
    #[error("Failed to initialize vector context: {0}")]
    Vector(#[from] VectorError),
}

/// Operations exposed to external surfaces (HTTP, CLI).
#[async_trait]
pub trait CautionApi: Send + Sync {
    /// Cache submitted document text.
    async fn cache_document(&self, id: &DocumentId, text: &str)
    -> Result<PutOutcome, ServiceError>;

    /// Read cached document text.
    async fn cached_document(&self, id: &DocumentId) -> Result<Option<String>, ServiceError>;

    /// Return the stored analysis for `id`, running the pipeline on `text` when there is none.
    async fn analyze(&self, id: &DocumentId, text: &str) -> Result<AnalysisOutcome, ServiceError>;
}

/// Production implementation of [`CautionApi`].
pub struct CautionService {
    cache: DocumentCache,
    pipeline: AnalysisPipeline,
}

impl CautionService {
    /// Combine an already constructed cache and pipeline.
    pub fn new(cache: DocumentCache, pipeline: AnalysisPipeline) -> Self {
        Self { cache, pipeline }
    }

    /// Build every collaborator from configuration.
    ///
    /// Missing credentials fail here. An unreachable Qdrant only logs a warning because the
    /// pipeline falls back to the submitted text at request time.
    pub async fn from_config(config: &Config) -> Result<Self, InitError> {
        let cache = DocumentCache::from_config(config)?;
        let results = Arc::new(SqliteResultStore::from_config(config)?);
        let model = language_model_from_config(config)?;
        let context = ContextStore::from_config(config)?;

        if let Some(context) = &context {
            match context.qdrant().list_collections().await {
                Ok(collections) => tracing::info!(
                    collections = collections.len(),
                    "Connected to Qdrant for vector context"
                ),
                Err(error) => tracing::warn!(
                    error = %error,
                    "Qdrant unreachable at startup; analysis will use submitted text until it recovers"
                ),
            }
        }

        let pipeline = AnalysisPipeline::from_config(config, results, model, context);
        Ok(Self::new(cache, pipeline))
    }
}

#[async_trait]
impl CautionApi for CautionService {
    async fn cache_document(
        &self,
        id: &DocumentId,
        text: &str,
    ) -> Result<PutOutcome, ServiceError> {
        Ok(self.cache.put(id, text).await?)
    }

    async fn cached_document(&self, id: &DocumentId) -> Result<Option<String>, ServiceError> {
        Ok(self.cache.get(id).await?)
    }

    async fn analyze(&self, id: &DocumentId, text: &str) -> Result<AnalysisOutcome, ServiceError> {
        Ok(self.pipeline.run(id, text).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[tokio::test]
    async fn builds_from_local_configuration() {
        let service = CautionService::from_config(&test_config())
            .await
            .expect("service");
        let id = DocumentId::parse("https://example.com/tos").expect("identity");

        let outcome = service
            .cache_document(&id, "Section 1.")
            .await
            .expect("cache");
        assert_eq!(outcome, PutOutcome::Stored);
        assert_eq!(
            service.cached_document(&id).await.expect("read"),
            Some("Section 1.".to_string())
        );
    }

    #[test]
    fn only_outages_are_retryable() {
        assert!(ServiceError::Cache(CacheError::Unavailable("down".into())).is_retryable());
        assert!(!ServiceError::Cache(CacheError::Protocol("bad".into())).is_retryable());
        assert!(
            !ServiceError::Pipeline(PipelineError::Results(ResultStoreError::Corrupt(
                "bad row".into()
            )))
            .is_retryable()
        );
    }
}
