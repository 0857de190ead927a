use super::analyzer::ChunkAnalyzer;
use super::chunking::chunk_text;
use super::fanout::{FanOutCoordinator, FanOutSettings};
use super::summarizer::{Summary, Summarizer};
use super::types::{AnalysisOutcome, PipelineError};
use crate::config::Config;
use crate::identity::DocumentId;
use crate::llm::LanguageModel;
use crate::results::{AnalysisResult, CreateOutcome, ResultStore};
use crate::vector::ContextStore;
use std::sync::Arc;
use time::OffsetDateTime;

/// Orchestrates lookup, chunking, fan-out, summary and persistence for one document.
pub struct AnalysisPipeline {
    results: Arc<dyn ResultStore>,
    coordinator: FanOutCoordinator,
    summarizer: Summarizer,
    context: Option<ContextStore>,
    chunk_max_chars: usize,
    persist_sentinels: bool,
}

impl AnalysisPipeline {
    /// Assemble a pipeline from explicit components.
    pub fn new(
        results: Arc<dyn ResultStore>,
        coordinator: FanOutCoordinator,
        summarizer: Summarizer,
        chunk_max_chars: usize,
    ) -> Self {
        Self {
            results,
            coordinator,
            summarizer,
            context: None,
            chunk_max_chars,
            persist_sentinels: true,
        }
    }

    /// Wire the pipeline from configuration, sharing `model` between analysis and summary.
    pub fn from_config(
        config: &Config,
        results: Arc<dyn ResultStore>,
        model: Arc<dyn LanguageModel>,
        context: Option<ContextStore>,
    ) -> Self {
        let analyzer = ChunkAnalyzer::new(Arc::clone(&model), config.analysis_model.clone());
        let coordinator = FanOutCoordinator::new(analyzer, FanOutSettings::from_config(config));
        let summarizer = Summarizer::new(model, config.summary_model.clone());
        let mut pipeline = Self::new(results, coordinator, summarizer, config.chunk_max_chars)
            .persist_sentinels(config.persist_sentinel_results);
        pipeline.context = context;
        pipeline
    }

    /// Route analysis text through `context` first.
    pub fn with_context(mut self, context: ContextStore) -> Self {
        self.context = Some(context);
        self
    }

    /// Whether sentinel summaries are stored. When off, the next request for the document
    /// reruns the whole analysis.
    pub fn persist_sentinels(mut self, persist: bool) -> Self {
        self.persist_sentinels = persist;
        self
    }

    /// Return the stored result for `id`, or analyze `text` and store the outcome.
    ///
    /// Only result store failures, invalid chunk settings and permanent vector configuration
    /// errors escape; every model failure ends in a sentinel summary.
    pub async fn run(&self, id: &DocumentId, text: &str) -> Result<AnalysisOutcome, PipelineError> {
        if let Some(existing) = self.results.find_by_document(id).await? {
            tracing::info!(document_id = %id, "Returning stored analysis");
            return Ok(AnalysisOutcome {
                result: existing,
                reused: true,
                persisted: true,
            });
        }

        let analysis_text = self.prepare_text(id, text).await?;
        let chunks = chunk_text(&analysis_text, self.chunk_max_chars)?;
        tracing::info!(document_id = %id, chunks = chunks.len(), "Analyzing document");

        let findings = self.coordinator.run_all(&chunks).await;
        let summary = self.summarizer.summarize(&findings).await;

        if summary.is_sentinel() && !self.persist_sentinels {
            tracing::warn!(
                document_id = %id,
                summary = summary.text(),
                "Analysis produced a sentinel; not storing it so a later request can retry"
            );
            return Ok(AnalysisOutcome {
                result: transient_result(id, summary),
                reused: false,
                persisted: false,
            });
        }

        let outcome = match self.results.create(id, summary.text()).await? {
            CreateOutcome::Created(result) => AnalysisOutcome {
                result,
                reused: false,
                persisted: true,
            },
            CreateOutcome::AlreadyExists(result) => AnalysisOutcome {
                result,
                reused: true,
                persisted: true,
            },
        };
        Ok(outcome)
    }

    async fn prepare_text(&self, id: &DocumentId, text: &str) -> Result<String, PipelineError> {
        let Some(context) = &self.context else {
            return Ok(text.to_string());
        };
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        match context.rebuild(id, text).await {
            Ok(rebuilt) if !rebuilt.trim().is_empty() => Ok(rebuilt),
            Ok(_) => Ok(text.to_string()),
            Err(error) if error.is_permanent() => Err(error.into()),
            Err(error) => {
                tracing::warn!(
                    document_id = %id,
                    error = %error,
                    "Vector context unavailable; analyzing submitted text directly"
                );
                Ok(text.to_string())
            }
        }
    }
}

fn transient_result(id: &DocumentId, summary: Summary) -> AnalysisResult {
    AnalysisResult {
        document_id: id.as_str().to_string(),
        summary_text: summary.into_text(),
        created_at: OffsetDateTime::now_utc(),
    }
}
