//! Serve command handler.
//!
//! Exposes one process-wide conversation over HTTP:
//! - `POST /api/ask` with `{"question": "..."}` answers `{"response": "..."}`
//! - `GET /health` reports liveness

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Args;
use convrag_core::{config::AppConfig, AppError, AppResult};
use convrag_knowledge::{Conversation, RagError, RagPipeline};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

const INVALID_QUESTION: &str = "Invalid or missing question in request body";

/// Serve the conversation over HTTP
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Bind address (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port (overrides server.port and PORT)
    #[arg(long)]
    pub port: Option<u16>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing serve command");
        config.validate()?;

        let host = self.host.as_deref().unwrap_or(&config.server.host);
        let port = self.port.unwrap_or(config.server.port);
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid address {}:{}: {}", host, port, e)))?;

        let pipeline = Arc::new(RagPipeline::from_config(config).await?);
        let router = build_router(AppState::new(pipeline));

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server is running on http://{}", addr);

        axum::serve(listener, router)
            .await
            .map_err(|e| AppError::Other(format!("Server error: {}", e)))
    }
}

/// Shared server state: the single conversation every request talks to.
#[derive(Clone)]
pub struct AppState {
    conversation: Arc<Mutex<Conversation>>,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self {
            conversation: Arc::new(Mutex::new(Conversation::new(pipeline))),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/ask", post(ask))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[derive(Debug, Serialize)]
struct AskResponse {
    response: String,
}

/// Errors a request can end in.
#[derive(Debug)]
enum ApiError {
    InvalidQuestion,
    Pipeline(RagError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::InvalidQuestion => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": INVALID_QUESTION }),
            ),
            Self::Pipeline(err) => {
                let stage = err.failed_stage();
                tracing::error!(stage = ?stage, "Error processing question: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({
                        "error": format!("Internal server error: {}", err),
                        "stage": stage,
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Non-blank string `question` from the request body, if any.
fn extract_question(payload: Result<Json<Value>, JsonRejection>) -> Option<String> {
    let Json(body) = payload.ok()?;
    let question = body.get("question")?.as_str()?.trim();
    (!question.is_empty()).then(|| question.to_string())
}

async fn ask(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = extract_question(payload).ok_or(ApiError::InvalidQuestion)?;

    let mut conversation = state.conversation.lock().await;
    let response = conversation
        .answer(&question)
        .await
        .map_err(ApiError::Pipeline)?;

    Ok(Json(AskResponse { response }))
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
