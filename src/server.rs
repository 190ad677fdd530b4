//! HTTP boundary: upload and retrieval endpoints.
//!
//! The upload handler validates the MIME type against the closed
//! PDF/DOCX/PPTX set, creates the resource row, enqueues an ingestion
//! job, and returns — parsing, chunking, and upserting happen on the
//! worker, and the client polls `GET /resources/{id}` for progress.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/upload` | Multipart upload (`file`, `lessonId`) |
//! | `POST` | `/search` | Lesson-scoped similarity search |
//! | `GET` | `/resources/{id}` | Resource record with processing status |
//! | `DELETE` | `/resources/{id}` | Remove a resource and its index records |
//! | `GET` | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "no file provided" } }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based study clients.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::index::VectorIndex;
use crate::ingest::{IngestJob, IngestPipeline};
use crate::models::RetrievedChunk;
use crate::parser;
use crate::resources::{InMemoryResourceStore, Resource, ResourceStore};
use crate::search::Retriever;

/// Shared application state passed to route handlers.
#[derive(Clone)]
struct AppState {
    queue: mpsc::Sender<IngestJob>,
    resources: Arc<dyn ResourceStore>,
    retriever: Arc<Retriever>,
    index: Arc<dyn VectorIndex>,
}

/// Start the HTTP server and its ingestion worker.
///
/// Binds to `[server].bind` and runs until the process is terminated.
/// The worker owns the receive side of the job queue; the upload handler
/// owns the send side.
pub async fn run_server(config: &Config, index: Arc<dyn VectorIndex>) -> anyhow::Result<()> {
    let resources: Arc<dyn ResourceStore> = Arc::new(InMemoryResourceStore::new());
    let (queue, jobs) = mpsc::channel::<IngestJob>(config.ingest.queue_depth);

    let pipeline = IngestPipeline::new(
        index.clone(),
        resources.clone(),
        config.chunking.clone(),
        config.ingest.clone(),
    );
    tokio::spawn(async move { pipeline.run(jobs).await });

    let retriever = Arc::new(Retriever::new(index.clone(), config.retrieval.top_k));
    let state = AppState {
        queue,
        resources,
        retriever,
        index,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/upload", post(handle_upload))
        .route("/search", post(handle_search))
        .route(
            "/resources/{id}",
            get(handle_get_resource).delete(handle_delete_resource),
        )
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error responses ============

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": { "code": self.code, "message": self.message }
        });
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    resource: Resource,
    message: &'static str,
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut lesson_id: Option<i64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(e.to_string()))?;
                file = Some((file_name, mime_type, bytes.to_vec()));
            }
            Some("lessonId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(e.to_string()))?;
                lesson_id = Some(
                    text.trim()
                        .parse()
                        .map_err(|_| bad_request("lessonId must be an integer"))?,
                );
            }
            _ => {}
        }
    }

    let (file_name, mime_type, bytes) = file.ok_or_else(|| bad_request("no file provided"))?;
    let lesson_id = lesson_id.ok_or_else(|| bad_request("no lesson ID provided"))?;

    if !parser::supported_mime(&mime_type) {
        return Err(bad_request(
            "invalid file type; only PDF, DOCX, and PPTX files are allowed",
        ));
    }

    let resource = state
        .resources
        .create(&file_name, &mime_type, lesson_id)
        .await
        .map_err(|e| internal(e.to_string()))?;

    let job = IngestJob {
        resource_id: resource.id,
        lesson_id,
        file_name,
        mime_type,
        bytes,
    };
    state
        .queue
        .send(job)
        .await
        .map_err(|_| internal("ingestion queue is closed"))?;

    Ok(Json(UploadResponse {
        success: true,
        resource,
        message: "File uploaded successfully. Processing in background.",
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    query: String,
    lesson_id: Option<i64>,
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<RetrievedChunk>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if request.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let results = state
        .retriever
        .search(&request.query, request.lesson_id, request.top_k)
        .await;
    Ok(Json(SearchResponse { results }))
}

async fn handle_get_resource(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Resource>, AppError> {
    let resource = state
        .resources
        .get(id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("no resource with id {}", id)))?;
    Ok(Json(resource))
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
    resource: Resource,
}

async fn handle_delete_resource(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, AppError> {
    if state
        .resources
        .get(id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .is_none()
    {
        return Err(not_found(format!("no resource with id {}", id)));
    }

    // drop the index records first; the row survives if the index call fails
    state
        .index
        .delete_by_resource(id)
        .await
        .map_err(|e| internal(e.to_string()))?;

    let resource = state
        .resources
        .remove(id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("no resource with id {}", id)))?;

    Ok(Json(DeleteResponse {
        success: true,
        resource,
    }))
}
