use async_trait::async_trait;
use caution::analysis::{
    AnalysisPipeline, ChunkAnalyzer, FanOutCoordinator, FanOutSettings, NO_USABLE_CONTENT,
    Summarizer,
};
use caution::api::create_router;
use caution::cache::{DocumentCache, MemoryKvStore, PutOutcome};
use caution::identity::DocumentId;
use caution::llm::{LanguageModel, LlmError, LlmRequest, LlmResponse};
use caution::results::SqliteResultStore;
use caution::service::{CautionApi, CautionService};
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;

const ANALYSIS_MODEL: &str = "analysis-model";
const SUMMARY_MODEL: &str = "summary-model";

/// Answers analysis prompts with a flagged clause and summary prompts with a heading.
#[derive(Default)]
struct CountingModel {
    analysis_calls: AtomicUsize,
    summary_calls: AtomicUsize,
}

impl CountingModel {
    fn total_calls(&self) -> usize {
        self.analysis_calls.load(Ordering::SeqCst) + self.summary_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for CountingModel {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        if request.model == SUMMARY_MODEL {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(LlmResponse {
                content: "## Data sharing\n- Your data may be shared with third parties.".into(),
            });
        }
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        let content = if request.prompt.contains("share your data") {
            "Shares personal data with third parties."
        } else {
            ""
        };
        Ok(LlmResponse {
            content: content.into(),
        })
    }
}

fn build_service(model: Arc<CountingModel>, chunk_max_chars: usize) -> CautionService {
    let cache = DocumentCache::new(Arc::new(MemoryKvStore::new()), Duration::from_secs(86_400));
    let results = Arc::new(SqliteResultStore::open_in_memory().expect("result store"));
    let coordinator = FanOutCoordinator::new(
        ChunkAnalyzer::new(model.clone(), ANALYSIS_MODEL),
        FanOutSettings {
            concurrency: 2,
            call_timeout: Duration::from_secs(5),
            deadline: Duration::from_secs(30),
        },
    );
    let summarizer = Summarizer::new(model, SUMMARY_MODEL);
    let pipeline = AnalysisPipeline::new(results, coordinator, summarizer, chunk_max_chars);
    CautionService::new(cache, pipeline)
}

#[tokio::test]
async fn cached_document_is_analyzed_once_and_then_reused() {
    let model = Arc::new(CountingModel::default());
    let service = build_service(model.clone(), 15_000);
    let id = DocumentId::parse("https://example.com/tos").expect("identity");
    let text = "Section 1. We may share your data with third parties...";

    let put = service.cache_document(&id, text).await.expect("cache put");
    assert_eq!(put, PutOutcome::Stored);
    let cached = service.cached_document(&id).await.expect("cache get");
    assert_eq!(cached.as_deref(), Some(text));

    let first = service
        .analyze(&id, cached.as_deref().unwrap_or_default())
        .await
        .expect("first analysis");
    assert!(!first.reused);
    assert!(first.persisted);
    assert_ne!(first.result.summary_text, NO_USABLE_CONTENT);
    assert!(first.result.summary_text.contains("Data sharing"));
    let calls = model.total_calls();
    assert_eq!(calls, 2);

    let second = service.analyze(&id, text).await.expect("second analysis");
    assert!(second.reused);
    assert_eq!(second.result, first.result);
    assert_eq!(model.total_calls(), calls);
}

#[tokio::test]
async fn chunks_without_findings_are_skipped_in_the_summary() {
    let model = Arc::new(CountingModel::default());
    let service = build_service(model.clone(), 40);
    let id = DocumentId::parse("https://example.com/long-tos").expect("identity");
    let text = "Welcome to our service and thank you for visiting. \
                We may share your data with partners. \
                These terms are governed by the laws of Delaware.";

    let outcome = service.analyze(&id, text).await.expect("analysis");

    assert!(outcome.persisted);
    assert!(model.analysis_calls.load(Ordering::SeqCst) >= 3);
    assert_eq!(model.summary_calls.load(Ordering::SeqCst), 1);
}

async fn request(app: axum::Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).expect("json"))
}

#[tokio::test]
async fn http_round_trip_through_the_router() {
    let model = Arc::new(CountingModel::default());
    let app = create_router(Arc::new(build_service(model.clone(), 15_000)));
    let text = "Section 1. We may share your data with third parties...";

    let (status, body) = request(
        app.clone(),
        Method::POST,
        "/api/cache",
        Some(json!({ "currentUrl": "https://example.com/tos", "bodyText": text })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "stored");

    let (status, body) = request(
        app.clone(),
        Method::GET,
        "/api/cache/https%3A%2F%2Fexample.com%2Ftos",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(text));

    let analyze = json!({ "collectionNameU": "https://example.com/tos", "text": text });
    let (status, first) = request(app.clone(), Method::POST, "/api/caution", Some(analyze.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["reused"], false);

    let (status, second) = request(app, Method::POST, "/api/caution", Some(analyze)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["reused"], true);
    assert_eq!(second["summary"], first["summary"]);
    assert_eq!(second["created_at"], first["created_at"]);
    assert_eq!(model.total_calls(), 2);
}
