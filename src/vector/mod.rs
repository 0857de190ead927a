//! Qdrant-backed context store.
//!
//! Before analysis the submitted text can be routed through a per-document collection:
//! the text is split into overlapping chunks, embedded, upserted, and then read back in
//! chunk order. The reassembled text is what the analysis pipeline chunks and analyzes.

mod client;
mod scroller;
mod types;

pub use client::{ENSURE_ATTEMPTS, QdrantService};
pub use scroller::stream_chunks;
pub use types::{StoredChunk, VectorError};

use crate::analysis::chunk_with_overlap;
use crate::config::Config;
use crate::embedding::{EmbeddingClient, embedding_client_from_config};
use crate::identity::DocumentId;
use std::sync::Arc;

/// Stores document chunks in Qdrant and reassembles them for analysis.
pub struct ContextStore {
    qdrant: QdrantService,
    embedder: Arc<dyn EmbeddingClient>,
    chunk_chars: usize,
    chunk_overlap: usize,
}

impl ContextStore {
    /// Assemble a context store from explicit collaborators.
    pub fn new(
        qdrant: QdrantService,
        embedder: Arc<dyn EmbeddingClient>,
        chunk_chars: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            qdrant,
            embedder,
            chunk_chars,
            chunk_overlap,
        }
    }

    /// Build the store when `VECTOR_CONTEXT_ENABLED` is set, or `None` otherwise.
    pub fn from_config(config: &Config) -> Result<Option<Self>, VectorError> {
        if !config.vector_context_enabled {
            return Ok(None);
        }
        let url = config
            .qdrant_url
            .as_deref()
            .ok_or_else(|| VectorError::InvalidUrl("QDRANT_URL is not set".into()))?;
        let qdrant = QdrantService::new(url, config.qdrant_api_key.clone())?;
        let embedder = embedding_client_from_config(config)?;
        Ok(Some(Self::new(
            qdrant,
            embedder,
            config.vector_chunk_chars,
            config.vector_chunk_overlap,
        )))
    }

    /// Underlying Qdrant client.
    pub fn qdrant(&self) -> &QdrantService {
        &self.qdrant
    }

    /// Store `text` under the document's collection and return the reassembled context.
    ///
    /// Stored chunks are joined with single spaces in chunk order. Points left over from a
    /// longer earlier submission are removed first so they never leak into the context.
    pub async fn rebuild(&self, id: &DocumentId, text: &str) -> Result<String, VectorError> {
        let chunks = chunk_with_overlap(text, self.chunk_chars, self.chunk_overlap)?;
        if chunks.is_empty() {
            return Ok(String::new());
        }

        let collection = id.collection_name();
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        self.qdrant
            .ensure_collection(&collection, self.embedder.dimension() as u64)
            .await?;
        let stored = self.qdrant.upsert_chunks(&collection, &chunks, vectors).await?;
        self.qdrant.delete_chunks_from(&collection, stored).await?;

        let context = self
            .qdrant
            .fetch_chunks(&collection)
            .await?
            .into_iter()
            .map(|chunk| chunk.text)
            .collect::<Vec<_>>()
            .join(" ");

        tracing::info!(
            document_id = %id,
            collection = %collection,
            chunks = stored,
            "Context rebuilt from vector store"
        );
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbeddingClient;
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn rebuild_reassembles_stored_chunks_in_order() {
        let server = MockServer::start_async().await;
        let id = DocumentId::parse("https://example.com/tos").expect("identity");
        let collection = id.collection_name();

        let lookup = server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/collections/{collection}"));
                then.status(200).json_body(json!({
                    "result": { "config": { "params": { "vectors": { "size": 8 } } } }
                }));
            })
            .await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path(format!("/collections/{collection}/points"))
                    .body_contains("\"chunkIndex\":1");
                then.status(200).json_body(json!({ "result": {} }));
            })
            .await;
        let delete = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("/collections/{collection}/points/delete"))
                    .body_contains("\"gte\":2");
                then.status(200).json_body(json!({ "result": {} }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("/collections/{collection}/points/scroll"));
                then.status(200).json_body(json!({
                    "result": {
                        "points": [
                            { "id": 1, "payload": { "text": "third parties.", "chunkIndex": 1 } },
                            { "id": 0, "payload": { "text": "We may share", "chunkIndex": 0 } }
                        ],
                        "next_page_offset": null
                    }
                }));
            })
            .await;

        let store = ContextStore::new(
            QdrantService::new(&server.base_url(), None)
                .expect("client")
                .with_retry_base(Duration::ZERO),
            Arc::new(HashEmbeddingClient::new(8).expect("embedder")),
            14,
            0,
        );

        let context = store
            .rebuild(&id, "We may share third parties.")
            .await
            .expect("rebuild");

        lookup.assert_async().await;
        upsert.assert_async().await;
        delete.assert_async().await;
        assert_eq!(context, "We may share third parties.");
    }

    #[tokio::test]
    async fn disabled_configuration_builds_nothing() {
        let config = crate::config::test_config();
        assert!(ContextStore::from_config(&config).expect("config").is_none());
    }
}
