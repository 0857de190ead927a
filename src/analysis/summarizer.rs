use super::types::Finding;
use crate::llm::{LanguageModel, LlmRequest};
use std::sync::Arc;

/// Returned when no chunk produced any findings; the model is never called in that case.
pub const NO_USABLE_CONTENT: &str = "Unable to analyze the terms and conditions";

/// Returned when the summary call itself failed.
pub const ANALYSIS_FAILED: &str = "Error analyzing terms and conditions";

const FINDINGS_SEPARATOR: &str = "\n\n";

const SUMMARY_PROMPT: &str = "You are Caution Bot. Below are notes flagged from different \
sections of one website's terms and conditions. Produce an organized summary for a consumer: \
group related concerns under short headings, merge duplicates, keep the most serious issues \
first, and stay concise.";

/// Final narrative for a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    /// Model-produced summary.
    Generated(String),
    /// No finding carried content.
    NoUsableContent,
    /// The summary call failed or returned nothing.
    Failed,
}

impl Summary {
    /// Text shown to the caller; sentinel variants map to their fixed strings.
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) => text,
            Self::NoUsableContent => NO_USABLE_CONTENT,
            Self::Failed => ANALYSIS_FAILED,
        }
    }

    /// Consume the summary into its caller-facing text.
    pub fn into_text(self) -> String {
        match self {
            Self::Generated(text) => text,
            other => other.text().to_string(),
        }
    }

    /// Whether this is one of the fixed sentinel strings.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, Self::Generated(_))
    }
}

/// Merges per-chunk findings into one summary through a second model call.
#[derive(Clone)]
pub struct Summarizer {
    model: Arc<dyn LanguageModel>,
    model_name: String,
}

impl Summarizer {
    /// Build a summarizer that calls `model_name` through `model`.
    pub fn new(model: Arc<dyn LanguageModel>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
        }
    }

    /// Summarize `findings`, calling the model at most once.
    pub async fn summarize(&self, findings: &[Finding]) -> Summary {
        let joined = findings
            .iter()
            .filter(|finding| !finding.is_empty())
            .map(|finding| finding.content.trim())
            .collect::<Vec<_>>()
            .join(FINDINGS_SEPARATOR);

        if joined.is_empty() {
            tracing::info!(
                findings = findings.len(),
                "No findings with content; skipping summary call"
            );
            return Summary::NoUsableContent;
        }

        let request = LlmRequest {
            prompt: format!("{SUMMARY_PROMPT}\n\nFlagged notes:\n{joined}"),
            model: self.model_name.clone(),
        };

        match self.model.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                Summary::Generated(response.content.trim().to_string())
            }
            Ok(_) => {
                tracing::warn!(model = %self.model_name, "Summary call returned no content");
                Summary::Failed
            }
            Err(error) => {
                tracing::error!(model = %self.model_name, error = %error, "Summary call failed");
                Summary::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fakes::ScriptedModel;

    #[tokio::test]
    async fn all_empty_findings_skip_the_model() {
        let model = Arc::new(ScriptedModel::answering("unused"));
        let summarizer = Summarizer::new(model.clone(), "summary-model");
        let findings = vec![Finding::ok(0, ""), Finding::failed(1), Finding::timed_out(2)];

        let summary = summarizer.summarize(&findings).await;

        assert_eq!(summary, Summary::NoUsableContent);
        assert_eq!(summary.text(), NO_USABLE_CONTENT);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn non_empty_findings_are_summarized_once() {
        let model = Arc::new(ScriptedModel::answering("## Data\n- Shared with partners"));
        let summarizer = Summarizer::new(model.clone(), "summary-model");
        let findings = vec![
            Finding::ok(0, "Shares data."),
            Finding::failed(1),
            Finding::ok(2, "Mandatory arbitration."),
        ];

        let summary = summarizer.summarize(&findings).await;

        assert_eq!(
            summary,
            Summary::Generated("## Data\n- Shared with partners".into())
        );
        assert!(!summary.is_sentinel());
        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "summary-model");
        assert!(
            requests[0]
                .prompt
                .contains("Shares data.\n\nMandatory arbitration.")
        );
    }

    #[tokio::test]
    async fn collaborator_failure_returns_failure_sentinel() {
        let model = Arc::new(ScriptedModel::failing());
        let summarizer = Summarizer::new(model.clone(), "summary-model");

        let summary = summarizer.summarize(&[Finding::ok(0, "Shares data.")]).await;

        assert_eq!(summary.clone().into_text(), ANALYSIS_FAILED);
        assert!(summary.is_sentinel());
        assert_eq!(model.call_count(), 1);
    }
}
