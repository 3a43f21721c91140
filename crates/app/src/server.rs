//! HTTP API for the chat front end.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Answer the latest user message with retrieved context |
//! | `POST` | `/api/process-pdfs` | Ingest every PDF of the documents directory |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Failures are logged and returned as `{ "error": "..." }` with a generic
//! localized message; the underlying cause never reaches the client.

use actuary_rag_core::{ChatService, IngestionPipeline, Message};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub const CHAT_FAILED: &str = "챗봇 응답 중 오류가 발생했습니다.";
pub const INGEST_FAILED: &str = "PDF 파일 처리 중 오류가 발생했습니다.";
pub const INGEST_DONE: &str = "PDF files processed successfully";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    chat: Arc<ChatService>,
    ingestion: Arc<IngestionPipeline>,
    documents_dir: Arc<PathBuf>,
    /// Serialises ingestion runs started through the API.
    ingest_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        chat: Arc<ChatService>,
        ingestion: Arc<IngestionPipeline>,
        documents_dir: PathBuf,
    ) -> Self {
        Self {
            chat,
            ingestion,
            documents_dir: Arc::new(documents_dir),
            ingest_lock: Arc::new(Mutex::new(())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/process-pdfs", post(handle_process_pdfs))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(bind_addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %listener.local_addr()?, "chat server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn internal(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<Message>,
}

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            error!(error = %rejection.body_text(), "malformed chat request");
            return Err(internal(CHAT_FAILED));
        }
    };

    if request.messages.is_empty() {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            message: "messages must not be empty".to_string(),
        });
    }

    match state.chat.reply(&request.messages).await {
        Ok(reply) => Ok(Json(reply)),
        Err(err) => {
            error!(error = %err, "chat request failed");
            Err(internal(CHAT_FAILED))
        }
    }
}

// ============ POST /api/process-pdfs ============

#[derive(Serialize)]
struct ProcessResponse {
    message: String,
    files: usize,
    records: usize,
}

async fn handle_process_pdfs(
    State(state): State<AppState>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let _guard = state.ingest_lock.lock().await;

    match state.ingestion.ingest_folder(&state.documents_dir).await {
        Ok(report) => Ok(Json(ProcessResponse {
            message: INGEST_DONE.to_string(),
            files: report.files.len(),
            records: report.records_upserted,
        })),
        Err(err) => {
            error!(error = %err, dir = %state.documents_dir.display(), "processing pdf files failed");
            Err(internal(INGEST_FAILED))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use actuary_rag_core::{
        CharacterNgramEmbedder, ChatOptions, ChunkMetadata, CompletionModel, EchoCompletion,
        InMemoryIndex, IngestionOptions, LopdfExtractor, PromptMessage, Retriever, SearchError,
        VectorIndex, VectorRecord,
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    struct FailingCompletion;

    #[async_trait]
    impl CompletionModel for FailingCompletion {
        async fn complete(&self, _messages: &[PromptMessage]) -> Result<Option<String>, SearchError> {
            Err(SearchError::Request("completion down".to_string()))
        }
    }

    pub(crate) async fn state_with(
        completion: Arc<dyn CompletionModel>,
        documents_dir: PathBuf,
    ) -> AppState {
        let embedder = Arc::new(CharacterNgramEmbedder::default());
        let index = Arc::new(InMemoryIndex::new());
        index
            .upsert(&[VectorRecord {
                id: "ifrs17.pdf-1-0-0".to_string(),
                values: embedder.embed_sync("IFRS17 contractual service margin"),
                metadata: ChunkMetadata {
                    text: "IFRS17 contractual service margin".to_string(),
                    source: "ifrs17.pdf".to_string(),
                    page: 1,
                },
            }])
            .await
            .expect("seed index");

        let retriever = Arc::new(Retriever::new(embedder.clone(), index.clone()));
        let chat = Arc::new(ChatService::new(retriever, completion, ChatOptions::default()));
        let ingestion = Arc::new(IngestionPipeline::new(
            Arc::new(LopdfExtractor),
            embedder,
            index,
            IngestionOptions::default(),
        ));
        AppState::new(chat, ingestion, documents_dir)
    }

    pub(crate) async fn spawn(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn chat_returns_assistant_message() {
        let dir = tempdir().unwrap();
        let base = spawn(state_with(Arc::new(EchoCompletion), dir.path().to_path_buf()).await).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/chat"))
            .json(&json!({ "messages": [{"role": "user", "content": "What is the CSM?"}] }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["role"], "assistant");
        assert!(body["content"].as_str().unwrap().contains("What is the CSM?"));
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn chat_failure_is_generic_500() {
        let dir = tempdir().unwrap();
        let base =
            spawn(state_with(Arc::new(FailingCompletion), dir.path().to_path_buf()).await).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/chat"))
            .json(&json!({ "messages": [{"role": "user", "content": "hi"}] }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], CHAT_FAILED);
        assert!(body.get("role").is_none());
    }

    #[tokio::test]
    async fn empty_message_list_is_rejected() {
        let dir = tempdir().unwrap();
        let base = spawn(state_with(Arc::new(EchoCompletion), dir.path().to_path_buf()).await).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/chat"))
            .json(&json!({ "messages": [] }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_chat_body_is_generic_500() {
        let dir = tempdir().unwrap();
        let base = spawn(state_with(Arc::new(EchoCompletion), dir.path().to_path_buf()).await).await;
        let client = reqwest::Client::new();

        let bodies = [
            r#"{"messages":[{"role":"system","content":"hi"}]}"#,
            r#"{}"#,
            "not json",
        ];
        for body in bodies {
            let response = client
                .post(format!("{base}/api/chat"))
                .header("content-type", "application/json")
                .body(body)
                .send()
                .await
                .unwrap();

            assert_eq!(response.status(), 500, "body: {body}");
            let json: Value = response.json().await.unwrap();
            assert_eq!(json["error"], CHAT_FAILED, "body: {body}");
        }
    }

    #[tokio::test]
    async fn process_pdfs_reports_success_and_failure() {
        let dir = tempdir().unwrap();
        let base = spawn(state_with(Arc::new(EchoCompletion), dir.path().to_path_buf()).await).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/api/process-pdfs"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], INGEST_DONE);
        assert_eq!(body["files"], 0);

        let missing = dir.path().join("missing");
        let base = spawn(state_with(Arc::new(EchoCompletion), missing).await).await;
        let response = client
            .post(format!("{base}/api/process-pdfs"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], INGEST_FAILED);
    }

    #[tokio::test]
    async fn health_reports_version() {
        let dir = tempdir().unwrap();
        let base = spawn(state_with(Arc::new(EchoCompletion), dir.path().to_path_buf()).await).await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }
}
