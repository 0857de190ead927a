//! Persisted analysis results, unique per document.
//!
//! A document has at most one stored result. Creation relies on the store's uniqueness
//! constraint, and losing a race to a concurrent writer is reported as
//! [`CreateOutcome::AlreadyExists`] carrying the winner's record.

mod sqlite;

pub use sqlite::SqliteResultStore;

use crate::identity::DocumentId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// Errors raised by result stores.
#[derive(Debug, Error)]
pub enum ResultStoreError {
    /// Store could not be reached or locked; callers may retry.
    #[error("Result store unavailable: {0}")]
    Unavailable(String),
    /// Stored row could not be decoded.
    #[error("Corrupt result record: {0}")]
    Corrupt(String),
}

/// Final summary stored for a document. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Canonical document identity.
    pub document_id: String,
    /// Summary text, possibly a sentinel.
    pub summary_text: String,
    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Outcome of [`ResultStore::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// This call stored the record.
    Created(AnalysisResult),
    /// A record already existed; it is returned unchanged.
    AlreadyExists(AnalysisResult),
}

impl CreateOutcome {
    /// Record now stored for the document, whoever wrote it.
    pub fn into_result(self) -> AnalysisResult {
        match self {
            Self::Created(result) | Self::AlreadyExists(result) => result,
        }
    }
}

/// Storage for analysis results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Look up the stored result for `id`.
    async fn find_by_document(
        &self,
        id: &DocumentId,
    ) -> Result<Option<AnalysisResult>, ResultStoreError>;

    /// Store `summary_text` for `id` unless a result already exists.
    async fn create(
        &self,
        id: &DocumentId,
        summary_text: &str,
    ) -> Result<CreateOutcome, ResultStoreError>;
}
