use super::analyzer::ChunkAnalyzer;
use super::types::{Chunk, Finding};
use crate::config::Config;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout_at};

/// Limits applied to one fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutSettings {
    /// Maximum number of analyses in flight; values below one are treated as one.
    pub concurrency: usize,
    /// Timeout for each individual analysis call.
    pub call_timeout: Duration,
    /// Deadline for the whole batch, measured from dispatch.
    pub deadline: Duration,
}

impl FanOutSettings {
    /// Read the limits from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.analysis_concurrency,
            call_timeout: config.analysis_call_timeout(),
            deadline: config.analysis_deadline(),
        }
    }
}

/// Runs chunk analyses concurrently and joins them in input order.
#[derive(Clone)]
pub struct FanOutCoordinator {
    analyzer: ChunkAnalyzer,
    settings: FanOutSettings,
}

impl FanOutCoordinator {
    /// Build a coordinator around `analyzer`.
    pub fn new(analyzer: ChunkAnalyzer, settings: FanOutSettings) -> Self {
        Self { analyzer, settings }
    }

    /// Analyze every chunk and return one finding per chunk, in input order.
    ///
    /// Waits for every analysis to settle. A call that outlives its timeout or the batch
    /// deadline becomes [`Finding::timed_out`]; no single chunk aborts the batch.
    pub async fn run_all(&self, chunks: &[Chunk]) -> Vec<Finding> {
        if chunks.is_empty() {
            return Vec::new();
        }

        let permits = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let deadline = instant_after(Instant::now(), self.settings.deadline);
        tracing::debug!(
            chunks = chunks.len(),
            concurrency = self.settings.concurrency.max(1),
            "Dispatching chunk analyses"
        );

        let tasks = chunks.iter().map(|chunk| {
            let permits = Arc::clone(&permits);
            async move {
                let Ok(Ok(_permit)) = timeout_at(deadline, permits.acquire_owned()).await else {
                    tracing::warn!(index = chunk.index, "Fan-out deadline passed before dispatch");
                    return Finding::timed_out(chunk.index);
                };
                let call_deadline =
                    instant_after(Instant::now(), self.settings.call_timeout).min(deadline);
                match timeout_at(call_deadline, self.analyzer.analyze(chunk)).await {
                    Ok(finding) => finding,
                    Err(_) => {
                        tracing::warn!(index = chunk.index, "Chunk analysis timed out");
                        Finding::timed_out(chunk.index)
                    }
                }
            }
        });

        let findings = join_all(tasks).await;
        let failed = findings.iter().filter(|finding| !finding.is_ok()).count();
        if failed > 0 {
            tracing::warn!(
                chunks = findings.len(),
                failed,
                "Some chunk analyses degraded to empty findings"
            );
        }
        findings
    }
}

// Roughly 30 years, matching tokio's own notion of "far future".
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn instant_after(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FindingStatus;
    use crate::llm::fakes::ScriptedModel;
    use crate::llm::{LlmError, LlmResponse};

    fn settings(concurrency: usize) -> FanOutSettings {
        FanOutSettings {
            concurrency,
            call_timeout: Duration::from_secs(60),
            deadline: Duration::from_secs(300),
        }
    }

    fn chunks(count: usize) -> Vec<Chunk> {
        (0..count)
            .map(|index| Chunk {
                index,
                text: format!("chunk-{index}"),
            })
            .collect()
    }

    fn echo_model() -> ScriptedModel {
        ScriptedModel::new(|request| {
            let marker = request
                .prompt
                .split_whitespace()
                .find(|word| word.starts_with("chunk-"))
                .unwrap_or_default()
                .to_string();
            Ok(LlmResponse { content: marker })
        })
    }

    #[tokio::test]
    async fn preserves_input_order() {
        let model = Arc::new(echo_model());
        let coordinator =
            FanOutCoordinator::new(ChunkAnalyzer::new(model.clone(), "m"), settings(3));

        let findings = coordinator.run_all(&chunks(7)).await;

        assert_eq!(findings.len(), 7);
        for (index, finding) in findings.iter().enumerate() {
            assert_eq!(finding.chunk_index, index);
            assert_eq!(finding.content, format!("chunk-{index}"));
        }
        assert_eq!(model.call_count(), 7);
    }

    #[tokio::test]
    async fn all_failures_yield_empty_findings() {
        let coordinator = FanOutCoordinator::new(
            ChunkAnalyzer::new(Arc::new(ScriptedModel::failing()), "m"),
            settings(2),
        );

        let findings = coordinator.run_all(&chunks(5)).await;

        assert_eq!(findings.len(), 5);
        assert!(findings.iter().all(|finding| finding.content.is_empty()));
        assert!(
            findings
                .iter()
                .all(|finding| finding.status == FindingStatus::Failed)
        );
    }

    #[tokio::test]
    async fn empty_input_never_contacts_the_model() {
        let model = Arc::new(ScriptedModel::answering("unused"));
        let coordinator = FanOutCoordinator::new(ChunkAnalyzer::new(model.clone(), "m"), settings(4));

        assert!(coordinator.run_all(&[]).await.is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded() {
        let model = Arc::new(echo_model().with_delay(Duration::from_millis(50)));
        let coordinator =
            FanOutCoordinator::new(ChunkAnalyzer::new(model.clone(), "m"), settings(2));

        let findings = coordinator.run_all(&chunks(6)).await;

        assert_eq!(findings.len(), 6);
        assert!(findings.iter().all(Finding::is_ok));
        assert_eq!(model.max_in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out_without_sinking_the_batch() {
        let model = Arc::new(ScriptedModel::new(|request| {
            if request.prompt.contains("chunk-1") {
                Err(LlmError::Unavailable("unreachable".into()))
            } else {
                Ok(LlmResponse {
                    content: "late".into(),
                })
            }
        }));
        let slow = Arc::new(
            ScriptedModel::answering("too late").with_delay(Duration::from_secs(120)),
        );

        let fast = FanOutCoordinator::new(ChunkAnalyzer::new(model, "m"), settings(4));
        let findings = fast.run_all(&chunks(2)).await;
        assert_eq!(findings[0].status, FindingStatus::Ok);
        assert_eq!(findings[1].status, FindingStatus::Failed);

        let bounded = FanOutCoordinator::new(
            ChunkAnalyzer::new(slow.clone(), "m"),
            FanOutSettings {
                concurrency: 4,
                call_timeout: Duration::from_secs(5),
                deadline: Duration::from_secs(300),
            },
        );
        let findings = bounded.run_all(&chunks(3)).await;
        assert_eq!(findings.len(), 3);
        assert!(
            findings
                .iter()
                .all(|finding| finding.status == FindingStatus::TimedOut && finding.content.is_empty())
        );
        assert_eq!(slow.call_count(), 3);
    }

    #[tokio::test]
    async fn oversized_limits_saturate_instead_of_panicking() {
        let model = Arc::new(echo_model());
        let coordinator = FanOutCoordinator::new(
            ChunkAnalyzer::new(model.clone(), "m"),
            FanOutSettings {
                concurrency: 2,
                call_timeout: Duration::from_secs(u64::MAX),
                deadline: Duration::from_secs(u64::MAX),
            },
        );

        let findings = coordinator.run_all(&chunks(3)).await;

        assert_eq!(findings.len(), 3);
        assert!(findings.iter().all(Finding::is_ok));
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_deadline_caps_queued_work() {
        let slow = Arc::new(echo_model().with_delay(Duration::from_secs(4)));
        let coordinator = FanOutCoordinator::new(
            ChunkAnalyzer::new(slow.clone(), "m"),
            FanOutSettings {
                concurrency: 1,
                call_timeout: Duration::from_secs(10),
                deadline: Duration::from_secs(10),
            },
        );

        let findings = coordinator.run_all(&chunks(4)).await;

        let statuses: Vec<_> = findings.iter().map(|finding| finding.status).collect();
        assert_eq!(
            statuses,
            vec![
                FindingStatus::Ok,
                FindingStatus::Ok,
                FindingStatus::TimedOut,
                FindingStatus::TimedOut
            ]
        );
    }
}
