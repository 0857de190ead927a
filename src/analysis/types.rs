//! Core data types and error definitions for the analysis pipeline.

use crate::results::{AnalysisResult, ResultStoreError};
use crate::vector::VectorError;
use thiserror::Error;

/// Errors produced while splitting text into chunks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// Chunk bound of zero can never be satisfied.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors that escape the pipeline instead of degrading into a sentinel.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Result store could not be read or written; callers may retry.
    #[error("Result store failed: {0}")]
    Results(#[from] ResultStoreError),
    /// Chunking parameters were invalid.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Vector context path hit a permanent configuration failure.
    #[error("Vector context failed: {0}")]
    Context(#[from] VectorError),
}

/// Word-aligned slice of a document, ephemeral to one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk within the document, starting at zero.
    pub index: usize,
    /// Words of the chunk joined by single spaces.
    pub text: String,
}

impl Chunk {
    /// Length of the chunk text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// How a chunk analysis ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingStatus {
    /// The model answered; content may still be empty.
    Ok,
    /// The model call failed.
    Failed,
    /// The call exceeded its timeout or the fan-out deadline.
    TimedOut,
}

/// Result of analyzing one chunk.
///
/// Failed and timed-out analyses carry empty content, so aggregation treats them exactly like a
/// chunk that contributed nothing; only `status` tells them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Index of the analyzed chunk.
    pub chunk_index: usize,
    /// Findings text produced by the model, possibly empty.
    pub content: String,
    /// Outcome of the model call.
    pub status: FindingStatus,
}

impl Finding {
    /// Successful analysis.
    pub fn ok(chunk_index: usize, content: impl Into<String>) -> Self {
        Self {
            chunk_index,
            content: content.into(),
            status: FindingStatus::Ok,
        }
    }

    /// Failed analysis degraded to an empty finding.
    pub fn failed(chunk_index: usize) -> Self {
        Self {
            chunk_index,
            content: String::new(),
            status: FindingStatus::Failed,
        }
    }

    /// Timed-out analysis degraded to an empty finding.
    pub fn timed_out(chunk_index: usize) -> Self {
        Self {
            chunk_index,
            content: String::new(),
            status: FindingStatus::TimedOut,
        }
    }

    /// Whether the model call succeeded.
    pub fn is_ok(&self) -> bool {
        self.status == FindingStatus::Ok
    }

    /// Whether the finding contributes nothing to the summary.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Outcome of [`crate::analysis::AnalysisPipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    /// Summary returned to the caller.
    pub result: AnalysisResult,
    /// `true` when an already persisted result was returned without running the pipeline.
    pub reused: bool,
    /// `true` when `result` is stored in the result store.
    pub persisted: bool,
}
