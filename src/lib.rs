#![deny(missing_docs)]

//! Core library for the caution service: cached terms-and-conditions text and chunked
//! language-model analysis with persisted summaries.

/// Chunking, fan-out analysis, summaries and the pipeline orchestrator.
pub mod analysis;
/// HTTP routing and REST handlers.
pub mod api;
/// Document text cache with expiry.
pub mod cache;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Canonical document identities.
pub mod identity;
/// Language-model client abstraction and adapters.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Persisted analysis results.
pub mod results;
/// Service facade wiring the collaborators together.
pub mod service;
/// Qdrant vector context integration.
pub mod vector;
