use crate::page::IndexPage;
use askama::Template;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use docqa_core::{
    ChatMessage, ChatModel, Embedder, RagCoordinator, RagError, Session, UploadedFile,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

pub type DynCoordinator = RagCoordinator<Arc<dyn Embedder>, Arc<dyn ChatModel>>;

const UPLOAD_FIELD: &str = "files";
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// One coordinator and one session per server. The mutex serializes
/// interactions so each handler sees the session exclusively.
#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<DynCoordinator>,
    session: Arc<Mutex<Session>>,
}

impl AppState {
    pub fn new(coordinator: DynCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            session: Arc::new(Mutex::new(Session::new())),
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/process", post(process_files))
        .route("/ask", post(ask_form))
        .route("/api/transcript", get(transcript))
        .route("/api/ask", post(ask_json))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Rag(RagError),
    Render(askama::Error),
}

impl From<RagError> for AppError {
    fn from(value: RagError) -> Self {
        Self::Rag(value)
    }
}

impl From<askama::Error> for AppError {
    fn from(value: askama::Error) -> Self {
        Self::Render(value)
    }
}

impl From<MultipartError> for AppError {
    fn from(value: MultipartError) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Rag(RagError::Ingest(error)) => (StatusCode::BAD_REQUEST, error.to_string()),
            Self::Rag(RagError::Service(error)) => {
                error!(%error, "service call failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
            Self::Render(error) => {
                error!(%error, "page rendering failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        };
        (status, message).into_response()
    }
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let session = state.session.lock().await;
    let body = IndexPage::from_session(&session).render()?;
    Ok(Html(body))
}

async fn process_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        // Browsers send an empty part with no filename when nothing was picked.
        let name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };
        let mime_type = field
            .content_type()
            .unwrap_or(FALLBACK_MIME_TYPE)
            .to_string();
        let bytes = field.bytes().await?;

        files.push(UploadedFile::new(name, mime_type, bytes.to_vec()));
    }

    let mut session = state.session.lock().await;
    if let Some(report) = session.process_files(state.coordinator.as_ref(), &files).await? {
        info!(
            files = report.files.len(),
            chunks = report.chunks.len(),
            "upload processed"
        );
    }

    Ok(Redirect::to("/"))
}

#[derive(Debug, Deserialize)]
pub struct AskForm {
    #[serde(default)]
    question: String,
}

async fn ask_form(
    State(state): State<AppState>,
    Form(form): Form<AskForm>,
) -> Result<Redirect, AppError> {
    let mut session = state.session.lock().await;
    session.ask(state.coordinator.as_ref(), &form.question).await?;
    Ok(Redirect::to("/"))
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    answer: String,
}

async fn ask_json(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let mut session = state.session.lock().await;
    let answer = session
        .ask(state.coordinator.as_ref(), &request.question)
        .await?
        .ok_or_else(|| AppError::BadRequest("question is empty".to_string()))?;
    Ok(Json(AskResponse { answer }))
}

async fn transcript(State(state): State<AppState>) -> Json<Vec<ChatMessage>> {
    let session = state.session.lock().await;
    Json(session.transcript().to_vec())
}

async fn health() -> &'static str {
    "ok"
}
