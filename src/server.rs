//! JSON HTTP boundary.
//!
//! # Endpoints
//!
//! | Method   | Path                    | Description |
//! |----------|-------------------------|-------------|
//! | `GET`    | `/health`               | Health check |
//! | `POST`   | `/process/text`         | Ingest raw text |
//! | `POST`   | `/process/file`         | Ingest an uploaded file (multipart) |
//! | `POST`   | `/search`               | Similarity search |
//! | `POST`   | `/chunk`                | Segmentation preview |
//! | `GET`    | `/documents`            | List registered documents |
//! | `DELETE` | `/documents/{doc_id}`   | Delete a document |
//! | `GET`    | `/stats`                | Service statistics |
//!
//! # Error Contract
//!
//! Error responses carry a machine-readable code and message:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document not found: abc" } }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `index_unavailable` (503).
//!
//! Degraded synchronization outcomes are not errors: the triggering request
//! succeeded, so they surface as `"status": "degraded"` plus a `warning`
//! field in an otherwise ordinary response body.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::models::{Document, SearchHit};
use crate::service::{IngestOutcome, RagService, ServiceError, Stats};
use crate::sync::SyncStatus;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    service: Arc<RagService>,
}

/// Starts the HTTP server; runs until the process is terminated.
pub async fn run_server(service: Arc<RagService>) -> anyhow::Result<()> {
    let bind_addr = service.config().server.bind.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(AppState { service }).layer(cors);

    info!(bind = %bind_addr, "HTTP server listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/process/text", post(handle_process_text))
        .route("/process/file", post(handle_process_file))
        .route("/search", post(handle_search))
        .route("/chunk", post(handle_chunk))
        .route("/documents", get(handle_list_documents))
        .route("/documents/{doc_id}", delete(handle_delete_document))
        .route("/stats", get(handle_stats))
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let (status, code) = match &err {
            ServiceError::InvalidRequest(_) | ServiceError::Extraction(_) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ServiceError::IndexUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "index_unavailable")
            }
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /process/text ============

#[derive(Deserialize)]
struct ProcessTextRequest {
    content: String,
    title: String,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[derive(Serialize)]
struct ProcessResponse {
    doc_id: String,
    chunks: usize,
    title: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

impl From<IngestOutcome> for ProcessResponse {
    fn from(outcome: IngestOutcome) -> Self {
        let (status, warning) = describe_status(&outcome.status);
        Self {
            doc_id: outcome.doc_id,
            chunks: outcome.chunk_count,
            title: outcome.title,
            status,
            warning,
        }
    }
}

fn describe_status(status: &SyncStatus) -> (String, Option<String>) {
    match status.degradation() {
        None => ("success".to_string(), None),
        Some(degradation) => ("degraded".to_string(), Some(degradation.to_string())),
    }
}

async fn handle_process_text(
    State(state): State<AppState>,
    Json(req): Json<ProcessTextRequest>,
) -> Result<Json<ProcessResponse>, AppError> {
    let outcome = state
        .service
        .ingest_text(&req.content, &req.title, &req.metadata)
        .await?;
    Ok(Json(outcome.into()))
}

// ============ POST /process/file ============

async fn handle_process_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(|name| name.to_string())
            .ok_or_else(|| bad_request("file field is missing a filename"))?;
        let content_type = field.content_type().map(|ct| ct.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(e.to_string()))?;

        let outcome = state
            .service
            .ingest_file(&filename, content_type.as_deref(), &bytes)
            .await?;
        return Ok(Json(outcome.into()));
    }
    Err(bad_request("multipart request must include a 'file' field"))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    limit: Option<usize>,
    threshold: Option<f64>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
    query: String,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let limit = req.limit.unwrap_or(state.service.config().search.default_limit);
    let threshold = req
        .threshold
        .unwrap_or(state.service.config().search.default_threshold);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(bad_request("threshold must be in [0.0, 1.0]"));
    }

    let results = state.service.search(&req.query, limit, threshold).await?;
    Ok(Json(SearchResponse {
        results,
        query: req.query,
    }))
}

// ============ POST /chunk ============

#[derive(Deserialize)]
struct ChunkRequest {
    content: String,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    overlap: usize,
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}

#[derive(Serialize)]
struct ChunkResponse {
    chunks: Vec<String>,
    count: usize,
    avg_size: f64,
}

async fn handle_chunk(
    State(state): State<AppState>,
    Json(req): Json<ChunkRequest>,
) -> Result<Json<ChunkResponse>, AppError> {
    let chunks = state
        .service
        .chunk_preview(&req.content, req.chunk_size, req.overlap)?;
    let count = chunks.len();
    let avg_size = if count == 0 {
        0.0
    } else {
        chunks.iter().map(|c| c.len()).sum::<usize>() as f64 / count as f64
    };
    Ok(Json(ChunkResponse {
        chunks,
        count,
        avg_size,
    }))
}

// ============ GET /documents ============

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<Document>,
    count: usize,
}

async fn handle_list_documents(State(state): State<AppState>) -> Json<DocumentsResponse> {
    let documents = state.service.list_documents().await;
    let count = documents.len();
    Json(DocumentsResponse { documents, count })
}

// ============ DELETE /documents/{doc_id} ============

#[derive(Serialize)]
struct DeleteResponse {
    message: String,
    doc_id: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let sync_status = state.service.delete_document(&doc_id).await?;
    let (status, warning) = describe_status(&sync_status);
    Ok(Json(DeleteResponse {
        message: "Document deleted".to_string(),
        doc_id,
        status,
        warning,
    }))
}

// ============ GET /stats ============

async fn handle_stats(State(state): State<AppState>) -> Json<Stats> {
    Json(state.service.stats().await)
}
