//! HTTP surface for the caution service.
//!
//! The router exposes a compact set of endpoints used by the browser extension:
//!
//! - `POST /api/cache` – Cache page text under its document identity. Accepts
//!   `{"document_id" | "currentUrl", "text" | "bodyText"}` and returns
//!   `{"status": "stored" | "unchanged"}`.
//! - `GET /api/cache/:identity` – Read cached text back. The identity is percent-encoded in
//!   the path and decoded exactly once by the extractor.
//! - `POST /api/caution` – Return the stored analysis for a document or run the pipeline.
//!   Accepts `{"document_id" | "collectionNameU", "text"}`.
//! - `GET /health` – Liveness probe.
//!
//! Every response carries permissive CORS headers and `OPTIONS` preflights are answered
//! directly, since requests originate from extension content scripts.

use crate::identity::{DocumentId, IdentityError};
use crate::service::{CautionApi, ServiceError};
use axum::{
    Json, Router,
    extract::{
        Path, Request, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use time::OffsetDateTime;

/// Build the HTTP router around `service`.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: CautionApi + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/api/cache", post(cache_document::<S>))
        .route("/api/cache/:identity", get(cached_document::<S>))
        .route("/api/caution", post(analyze_document::<S>))
        .layer(middleware::from_fn(cors))
        .with_state(service)
}

/// Request body for `POST /api/cache`.
#[derive(Deserialize)]
struct CacheWriteRequest {
    #[serde(default, alias = "currentUrl")]
    document_id: Option<String>,
    #[serde(default, alias = "bodyText")]
    text: Option<String>,
}

#[derive(Serialize)]
struct CacheWriteResponse {
    status: &'static str,
}

async fn cache_document<S>(
    State(service): State<Arc<S>>,
    body: Result<Json<CacheWriteRequest>, JsonRejection>,
) -> Result<Json<CacheWriteResponse>, AppError>
where
    S: CautionApi,
{
    let Json(request) = body?;
    let id = required_identity(request.document_id)?;
    let text = required_text(request.text)?;

    let outcome = service.cache_document(&id, &text).await?;
    tracing::info!(document_id = %id, status = outcome.as_str(), "Cache write completed");
    Ok(Json(CacheWriteResponse {
        status: outcome.as_str(),
    }))
}

async fn cached_document<S>(
    State(service): State<Arc<S>>,
    identity: Result<Path<String>, PathRejection>,
) -> Result<Json<String>, AppError>
where
    S: CautionApi,
{
    let Path(identity) = identity?;
    let id = DocumentId::parse(&identity)?;
    match service.cached_document(&id).await? {
        Some(text) => Ok(Json(text)),
        None => Err(AppError::NotFound),
    }
}

/// Request body for `POST /api/caution`.
#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(default, alias = "collectionNameU")]
    document_id: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    document_id: String,
    summary: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    reused: bool,
}

async fn analyze_document<S>(
    State(service): State<Arc<S>>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError>
where
    S: CautionApi,
{
    let Json(request) = body?;
    let id = required_identity(request.document_id)?;
    let text = required_text(request.text)?;

    let outcome = service.analyze(&id, &text).await?;
    tracing::info!(
        document_id = %id,
        reused = outcome.reused,
        persisted = outcome.persisted,
        "Analysis request completed"
    );
    Ok(Json(AnalyzeResponse {
        document_id: outcome.result.document_id,
        summary: outcome.result.summary_text,
        created_at: outcome.result.created_at,
        reused: outcome.reused,
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn required_identity(raw: Option<String>) -> Result<DocumentId, AppError> {
    Ok(DocumentId::parse(raw.as_deref().unwrap_or_default())?)
}

fn required_text(raw: Option<String>) -> Result<String, AppError> {
    match raw {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(AppError::BadRequest("text is required".into())),
    }
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

enum AppError {
    BadRequest(String),
    NotFound,
    Service(ServiceError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            Self::Service(error) if error.is_retryable() => {
                tracing::warn!(error = %error, "Request failed on an unavailable store");
                (StatusCode::SERVICE_UNAVAILABLE, error.to_string())
            }
            Self::Service(error) => {
                tracing::error!(error = %error, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(inner: ServiceError) -> Self {
        Self::Service(inner)
    }
}

impl From<IdentityError> for AppError {
    fn from(inner: IdentityError) -> Self {
        Self::BadRequest(inner.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
