use super::types::{Chunk, Finding};
use crate::llm::{LanguageModel, LlmRequest};
use std::sync::Arc;

const ANALYSIS_PROMPT: &str = "You are Caution Bot, a consumer-protection assistant. \
Read the following excerpt of a website's terms and conditions and list every clause a \
user should be cautious about: data sharing or selling, tracking, arbitration or class-action \
waivers, automatic renewals, hidden fees, liability limits, content licensing, and unilateral \
changes to the terms. Quote or paraphrase each clause briefly and explain the risk in one \
sentence. If nothing in the excerpt is concerning, answer with an empty response.";

/// Sends one chunk to the language model and degrades failures into empty findings.
#[derive(Clone)]
pub struct ChunkAnalyzer {
    model: Arc<dyn LanguageModel>,
    model_name: String,
}

impl ChunkAnalyzer {
    /// Build an analyzer that calls `model_name` through `model`.
    pub fn new(model: Arc<dyn LanguageModel>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
        }
    }

    /// Analyze a single chunk.
    ///
    /// Never fails: collaborator errors yield [`Finding::failed`] and are logged at `warn` with
    /// the chunk index. A blank answer means the model found nothing to flag and stays
    /// [`FindingStatus::Ok`](super::FindingStatus::Ok).
    pub async fn analyze(&self, chunk: &Chunk) -> Finding {
        let request = LlmRequest {
            prompt: build_prompt(&chunk.text),
            model: self.model_name.clone(),
        };

        match self.model.complete(request).await {
            Ok(response) => {
                let content = response.content.trim().to_string();
                tracing::debug!(
                    index = chunk.index,
                    chars = content.len(),
                    "Chunk analyzed"
                );
                Finding::ok(chunk.index, content)
            }
            Err(error) => {
                tracing::warn!(
                    index = chunk.index,
                    model = %self.model_name,
                    error = %error,
                    "Chunk analysis failed; continuing with empty finding"
                );
                Finding::failed(chunk.index)
            }
        }
    }
}

fn build_prompt(chunk_text: &str) -> String {
    format!("{ANALYSIS_PROMPT}\n\nTerms excerpt:\n\"\"\"\n{chunk_text}\n\"\"\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FindingStatus;
    use crate::llm::fakes::ScriptedModel;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            index: 3,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn embeds_chunk_text_and_model_name() {
        let model = Arc::new(ScriptedModel::answering("  - Shares data with partners.\n"));
        let analyzer = ChunkAnalyzer::new(model.clone(), "analysis-model");

        let finding = analyzer
            .analyze(&chunk("We may share your data with third parties."))
            .await;

        assert_eq!(finding, Finding::ok(3, "- Shares data with partners."));
        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "analysis-model");
        assert!(
            requests[0]
                .prompt
                .contains("We may share your data with third parties.")
        );
    }

    #[tokio::test]
    async fn collaborator_failure_yields_empty_failed_finding() {
        let analyzer = ChunkAnalyzer::new(Arc::new(ScriptedModel::failing()), "analysis-model");

        let finding = analyzer.analyze(&chunk("anything")).await;

        assert_eq!(finding.chunk_index, 3);
        assert!(finding.content.is_empty());
        assert_eq!(finding.status, FindingStatus::Failed);
    }

    #[tokio::test]
    async fn blank_answer_is_a_successful_empty_finding() {
        let analyzer = ChunkAnalyzer::new(Arc::new(ScriptedModel::answering("  \n ")), "m");

        let finding = analyzer.analyze(&chunk("harmless")).await;

        assert_eq!(finding.status, FindingStatus::Ok);
        assert!(finding.content.is_empty());
    }
}
