//! Chunked language-model analysis of terms-and-conditions text.
//!
//! A document is split into word-aligned chunks, each chunk is analyzed concurrently under a
//! bounded limiter, the non-empty findings are merged by a second model call, and the summary
//! is persisted so repeat requests skip all of it. Model failures never escape this module:
//! they degrade into empty findings or one of the sentinel summaries.

mod analyzer;
mod chunking;
mod fanout;
mod pipeline;
mod summarizer;
mod types;

pub use analyzer::ChunkAnalyzer;
pub use chunking::{chunk_text, chunk_with_overlap};
pub use fanout::{FanOutCoordinator, FanOutSettings};
pub use pipeline::AnalysisPipeline;
pub use summarizer::{ANALYSIS_FAILED, NO_USABLE_CONTENT, Summarizer, Summary};
pub use types::{
    AnalysisOutcome, Chunk, ChunkingError, Finding, FindingStatus, PipelineError,
};
