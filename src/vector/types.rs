//! Shared types used by the Qdrant client and the context store.

use crate::analysis::ChunkingError;
use crate::embedding::EmbeddingError;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with Qdrant or preparing its points.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Existing collection was created for a different embedding size.
    #[error("Collection {collection} stores {actual}-dimensional vectors, expected {expected}")]
    DimensionMismatch {
        /// Collection name.
        collection: String,
        /// Dimension produced by the configured embedding provider.
        expected: u64,
        /// Dimension recorded by Qdrant.
        actual: u64,
    },
    /// Qdrant answered with a body that did not match the expected shape.
    #[error("Malformed Qdrant response: {0}")]
    Malformed(String),
    /// Embedding provider failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// Context chunking parameters were invalid.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
}

impl VectorError {
    /// Whether retrying can never succeed without a configuration change.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::InvalidUrl(_)
            | Self::DimensionMismatch { .. }
            | Self::Chunking(_)
            | Self::Embedding(EmbeddingError::Config(_)) => true,
            Self::UnexpectedStatus { status, .. } => {
                matches!(*status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
            }
            _ => false,
        }
    }
}

/// Chunk text read back from a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChunk {
    /// Position of the chunk in the source document.
    pub index: usize,
    /// Stored chunk text.
    pub text: String,
}

#[derive(Deserialize)]
pub(crate) struct ListCollectionsResponse {
    pub(crate) result: ListCollectionsResult,
}

#[derive(Deserialize)]
pub(crate) struct ListCollectionsResult {
    pub(crate) collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
pub(crate) struct CollectionDescription {
    pub(crate) name: String,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfoResponse {
    pub(crate) result: CollectionInfo,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfo {
    pub(crate) config: CollectionConfig,
}

#[derive(Deserialize)]
pub(crate) struct CollectionConfig {
    pub(crate) params: CollectionParams,
}

#[derive(Deserialize)]
pub(crate) struct CollectionParams {
    pub(crate) vectors: Value,
}

impl CollectionParams {
    /// Size of the unnamed vector; named-vector collections are not produced by this crate.
    pub(crate) fn vector_size(&self) -> Option<u64> {
        self.vectors.get("size").and_then(Value::as_u64)
    }
}

#[derive(Deserialize)]
pub(crate) struct ScrollResponse {
    pub(crate) result: ScrollResult,
}

#[derive(Deserialize)]
pub(crate) struct ScrollResult {
    #[serde(default)]
    pub(crate) points: Vec<ScrollPoint>,
    #[serde(default)]
    pub(crate) next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
pub(crate) struct ScrollPoint {
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
