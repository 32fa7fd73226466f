//! HTTP API server.
//!
//! Exposes the CRUD surface and the document-ingestion pipeline over a JSON
//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service name and version |
//! | `GET`  | `/health` | Health check |
//! | `POST` | `/api/v1/users` | Create a user |
//! | `GET`  | `/api/v1/users/{id}` | Fetch a user |
//! | `POST` | `/api/v1/chats` | Create a chat |
//! | `GET`  | `/api/v1/chats/{id}` | Fetch a chat |
//! | `POST` | `/api/v1/messages` | Create a message |
//! | `GET`  | `/api/v1/messages/{id}` | Fetch a message |
//! | `POST` | `/api/v1/documents/upload` | Multipart upload, runs the ingestion pipeline |
//! | `GET`  | `/api/v1/documents/search` | Semantic search over document embeddings |
//! | `GET`  | `/api/v1/documents/{id}` | Fetch a document's public fields |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "unsupported_format", "message": "unsupported file type: application/json" } }
//! ```
//!
//! Error codes: `bad_request`, `unsupported_format`, `extraction_failed`,
//! `empty_content`, `embeddings_disabled` (400), `not_found` (404),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::ingest::{self, IngestError};
use crate::models::{Chat, Document, DocumentUpload, Message, User};
use crate::search;
use crate::store;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
}

/// Starts the HTTP server on the configured bind address.
///
/// The schema must exist (`chatvault init`); the embedding provider is
/// validated up front so a missing API key fails at startup instead of on
/// the first upload.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    if config.embedding.is_enabled() && std::env::var("OPENAI_API_KEY").is_err() {
        anyhow::bail!(
            "OPENAI_API_KEY environment variable not set (required for embedding provider '{}')",
            config.embedding.provider
        );
    }

    let bind_addr = config.server.bind.clone();
    let pool = db::connect(config).await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
    };
    let app = build_router(state);

    info!("listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the router with all routes and layers. Separated from
/// [`run_server`] so tests can serve it on an ephemeral port.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/api/v1/users", post(handle_create_user))
        .route("/api/v1/users/{id}", get(handle_get_user))
        .route("/api/v1/chats", post(handle_create_chat))
        .route("/api/v1/chats/{id}", get(handle_get_chat))
        .route("/api/v1/messages", post(handle_create_message))
        .route("/api/v1/messages/{id}", get(handle_get_message))
        .route("/api/v1/documents/upload", post(handle_upload_document))
        .route("/api/v1/documents/search", get(handle_search_documents))
        .route("/api/v1/documents/{id}", get(handle_get_document))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"unsupported_format"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an HTTP response.
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

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        let (status, code) = match &err {
            IngestError::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "unsupported_format"),
            IngestError::ExtractionFailed(_) => (StatusCode::BAD_REQUEST, "extraction_failed"),
            IngestError::EmptyContent => (StatusCode::BAD_REQUEST, "empty_content"),
            IngestError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

/// Maps semantic-search errors onto the HTTP contract: a disabled embedding
/// provider is a client-visible configuration error, everything else is
/// internal.
fn classify_search_error(err: anyhow::Error) -> AppError {
    let msg = err.to_string();

    if msg.contains("embeddings") || msg.contains("disabled") {
        let mut e = bad_request(msg);
        e.code = "embeddings_disabled".to_string();
        e
    } else {
        internal(msg)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

// ============ GET / and GET /health ============

#[derive(Serialize)]
struct RootResponse {
    name: String,
    version: String,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        name: "chat-vault".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

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

// ============ Users ============

#[derive(Deserialize)]
struct CreateUserRequest {
    username: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Serialize)]
struct UserResponse {
    id: String,
    username: String,
    email: Option<String>,
    created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: format_ts_iso(user.created_at),
        }
    }
}

async fn handle_create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if req.username.trim().is_empty() {
        return Err(bad_request("username must not be empty"));
    }

    let user = store::create_user(&state.pool, &req.username, req.email.as_deref())
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(UserResponse::from(user)))
}

async fn handle_get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = store::get_user(&state.pool, &id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found("User not found"))?;

    Ok(Json(UserResponse::from(user)))
}

// ============ Chats ============

#[derive(Deserialize)]
struct CreateChatRequest {
    #[serde(default)]
    title: Option<String>,
    user_id: String,
}

#[derive(Serialize)]
struct ChatResponse {
    id: String,
    title: Option<String>,
    user_id: String,
    created_at: String,
}

impl From<Chat> for ChatResponse {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id,
            title: chat.title,
            user_id: chat.user_id,
            created_at: format_ts_iso(chat.created_at),
        }
    }
}

async fn handle_create_chat(
    State(state): State<AppState>,
    Json(req): Json<CreateChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    ensure_user_exists(&state.pool, &req.user_id).await?;

    let chat = store::create_chat(&state.pool, req.title.as_deref(), &req.user_id)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(ChatResponse::from(chat)))
}

async fn handle_get_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatResponse>, AppError> {
    let chat = store::get_chat(&state.pool, &id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found("Chat not found"))?;

    Ok(Json(ChatResponse::from(chat)))
}

// ============ Messages ============

#[derive(Deserialize)]
struct CreateMessageRequest {
    chat_id: String,
    role: String,
    content: String,
}

#[derive(Serialize)]
struct MessageResponse {
    id: String,
    chat_id: String,
    role: String,
    content: String,
    created_at: String,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            chat_id: message.chat_id,
            role: message.role,
            content: message.content,
            created_at: format_ts_iso(message.created_at),
        }
    }
}

async fn handle_create_message(
    State(state): State<AppState>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    store::get_chat(&state.pool, &req.chat_id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found("Chat not found"))?;

    let message = store::create_message(&state.pool, &req.chat_id, &req.role, &req.content)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(MessageResponse::from(message)))
}

async fn handle_get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = store::get_message(&state.pool, &id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found("Message not found"))?;

    Ok(Json(MessageResponse::from(message)))
}

// ============ Documents ============

/// Public fields of a persisted document. The embedding itself is not
/// exposed over the API.
#[derive(Serialize)]
struct DocumentResponse {
    id: String,
    filename: String,
    metadata: serde_json::Value,
    content: String,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename,
            metadata: doc.metadata,
            content: doc.content,
        }
    }
}

async fn handle_upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DocumentResponse>, AppError> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut user_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart payload: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("could not read file field: {}", e)))?;
                file = Some((filename, content_type, bytes.to_vec()));
            }
            "user_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("could not read user_id field: {}", e)))?;
                user_id = Some(value);
            }
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| bad_request("missing 'file' field"))?;
    let user_id = user_id.ok_or_else(|| bad_request("missing 'user_id' field"))?;

    Uuid::parse_str(&user_id).map_err(|_| bad_request("user_id must be a UUID"))?;
    ensure_user_exists(&state.pool, &user_id).await?;

    let upload = DocumentUpload {
        filename,
        content_type,
        bytes,
        user_id,
    };
    let doc = ingest::ingest_document(&state.pool, &state.config.embedding, upload).await?;

    info!(id = %doc.id, filename = %doc.filename, "document ingested");

    Ok(Json(DocumentResponse::from(doc)))
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, AppError> {
    let doc = store::get_document(&state.pool, &id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found("Document not found"))?;

    Ok(Json(DocumentResponse::from(doc)))
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Serialize)]
struct SearchResult {
    id: String,
    filename: String,
    score: f64,
}

async fn handle_search_documents(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    if params.q.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let limit = params.limit.unwrap_or(10);
    let hits = search::semantic_search(&state.pool, &state.config.embedding, &params.q, limit)
        .await
        .map_err(classify_search_error)?;

    Ok(Json(SearchResponse {
        results: hits
            .into_iter()
            .map(|hit| SearchResult {
                id: hit.id,
                filename: hit.filename,
                score: hit.score,
            })
            .collect(),
    }))
}

async fn ensure_user_exists(pool: &SqlitePool, user_id: &str) -> Result<(), AppError> {
    store::get_user(pool, user_id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found("User not found"))?;

    Ok(())
}
