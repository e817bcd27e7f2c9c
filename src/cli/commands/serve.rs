//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for uploading documents, asking questions and
//! removing documents from the index.

use crate::cli::Output;
use crate::config::Settings;
use crate::document::Metadata;
use crate::error::DocqaError;
use crate::loader;
use crate::orchestrator::Orchestrator;
use crate::rag::Query;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let max_upload_bytes = settings.server.max_upload_mb * 1024 * 1024;

    let orchestrator = Orchestrator::new(settings)?;
    orchestrator.initialize().await?;

    let app = router(Arc::new(AppState { orchestrator }), max_upload_bytes);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("docqa API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /");
    Output::kv("Upload", "POST   /upload");
    Output::kv("Ask", "POST   /ask");
    Output::kv("Remove", "DELETE /documents/:document_id");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/upload", post(upload))
        .route("/ask", post(ask))
        .route("/documents/{document_id}", delete(remove_document))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Debug, Serialize)]
struct UploadResponse {
    message: String,
    filename: String,
    chunks_written: usize,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    score_threshold: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    answer: String,
    grounded: bool,
    sources: Vec<SourceInfo>,
}

#[derive(Debug, Serialize)]
struct SourceInfo {
    text: String,
    metadata: Metadata,
    score: f32,
}

#[derive(Debug, Serialize)]
struct RemoveResponse {
    document_id: String,
    deleted: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

/// An error rendered as `{detail}` with a status code.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<DocqaError> for ApiError {
    fn from(err: DocqaError) -> Self {
        let status = match &err {
            DocqaError::InvalidArgument(_) | DocqaError::UnsupportedFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", err);
        }
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy", "service": "docqa" }))
}

async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("File name is required"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        return ingest_upload(&state, &filename, &bytes).await.map(Json);
    }

    Err(ApiError::bad_request("Missing multipart field 'file'"))
}

async fn ingest_upload(
    state: &AppState,
    filename: &str,
    bytes: &[u8],
) -> Result<UploadResponse, ApiError> {
    if !loader::is_supported(filename) {
        return Err(ApiError::bad_request(format!(
            "Unsupported file format. Supported: {}",
            loader::SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    let (name, data) = (filename.to_string(), bytes.to_vec());
    let document = run_blocking(move || loader::load_document_from_bytes(&name, &data)).await??;
    if document.text.trim().is_empty() {
        return Err(ApiError::bad_request("No text could be extracted from the file"));
    }

    let config = state.orchestrator.settings().chunking.to_config();
    let summary = state.orchestrator.ingest(&document, &config).await?;
    info!("Uploaded '{}' ({} chunks)", filename, summary.chunks_written);

    Ok(UploadResponse {
        message: "File processed successfully".to_string(),
        filename: filename.to_string(),
        chunks_written: summary.chunks_written,
    })
}

/// Run CPU-bound extraction off the async executor.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("Document extraction aborted: {}", e);
        ApiError::bad_request("Failed to read the uploaded file")
    })
}

async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    if req.question.trim().is_empty() {
        return Err(ApiError::bad_request("Question cannot be empty"));
    }

    let mut query = Query::new(req.question);
    if let Some(k) = req.top_k {
        query = query.with_top_k(k);
    }
    if let Some(threshold) = req.score_threshold {
        query = query.with_score_threshold(threshold);
    }

    let answer = state.orchestrator.answer(&query).await?;

    Ok(Json(AskResponse {
        answer: answer.answer,
        grounded: answer.grounded,
        sources: answer
            .sources
            .into_iter()
            .map(|s| SourceInfo {
                text: s.text,
                metadata: s.metadata,
                score: s.score,
            })
            .collect(),
    }))
}

async fn remove_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<Json<RemoveResponse>, ApiError> {
    let deleted = state.orchestrator.remove_document(&document_id).await?;
    Ok(Json(RemoveResponse {
        document_id,
        deleted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::embedding::HashingEmbedder;
    use crate::generation::ExtractiveGenerator;
    use crate::vector_store::MemoryVectorStore;

    fn state() -> Arc<AppState> {
        let mut settings = Settings::default();
        settings.chunking.chunk_size = 20;
        settings.chunking.overlap = 5;
        let orchestrator = Orchestrator::with_components(
            settings,
            Prompts::default(),
            Arc::new(HashingEmbedder::new()),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(ExtractiveGenerator::new()),
        );
        Arc::new(AppState { orchestrator })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let body = body_json(health().await.into_response()).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "docqa");
    }

    #[tokio::test]
    async fn test_upload_then_ask() {
        let state = state();

        let uploaded = ingest_upload(&state, "colors.txt", b"The sky is blue. Grass is green.")
            .await
            .unwrap();
        assert_eq!(uploaded.filename, "colors.txt");
        assert!(uploaded.chunks_written >= 2);

        let request = AskRequest {
            question: "What color is the sky?".to_string(),
            top_k: None,
            score_threshold: None,
        };
        let Json(response) = ask(State(state), Json(request)).await.unwrap();
        assert!(response.grounded);
        assert!(response.answer.to_lowercase().contains("blue"));
        assert!(response
            .sources
            .iter()
            .all(|s| s.metadata["source"] == "colors.txt"));
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_and_empty_files() {
        let state = state();

        let err = ingest_upload(&state, "slides.pptx", b"data").await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = ingest_upload(&state, "blank.txt", b"   \n").await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_extraction_panic_is_bad_request() {
        let err = run_blocking(|| -> usize { panic!("malformed xref table") })
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.detail, "Failed to read the uploaded file");

        assert_eq!(run_blocking(|| 7).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_ask_rejects_empty_question() {
        let request = AskRequest {
            question: "  ".to_string(),
            top_k: None,
            score_threshold: None,
        };
        let err = ask(State(state()), Json(request)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let body = body_json(err.into_response()).await;
        assert_eq!(body["detail"], "Question cannot be empty");
    }

    #[tokio::test]
    async fn test_remove_document() {
        let state = state();
        ingest_upload(&state, "colors.txt", b"The sky is blue. Grass is green.")
            .await
            .unwrap();

        let Json(response) = remove_document(State(state.clone()), Path("colors.txt".to_string()))
            .await
            .unwrap();
        assert_eq!(response.document_id, "colors.txt");
        assert!(response.deleted >= 2);
        assert_eq!(state.orchestrator.count().await.unwrap(), 0);
    }

    #[test]
    fn test_error_status_mapping() {
        let err: ApiError = DocqaError::UnsupportedFormat("x".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = DocqaError::Generation("down".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_router_builds() {
        let _ = router(state(), 1024);
    }
}
