//! REST API for the assistant session
//!
//! Lets a remote UI drive the session over HTTP. Streaming deltas still go to
//! the session observer; the HTTP response carries the final outcome.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::models::SubmitOutcome;
use crate::session::ConversationSession;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RememberRequest {
    pub fact: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub session: Arc<ConversationSession>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let caps = state.session.capabilities();
    Json(serde_json::json!({
        "status": "healthy",
        "local_ready": caps.local_ready,
        "remote_configured": caps.remote_key_configured,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    // Generation runs on its own task: a client disconnect drops this
    // handler, never the generation already under way.
    let session = Arc::clone(&state.session);
    let task = tokio::spawn(async move { session.submit(&req.message).await });

    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Chat task failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Chat task failed".into())),
            );
        }
    };
    info!("Chat outcome: {:?}", outcome);

    match outcome {
        SubmitOutcome::Ignored => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Message cannot be empty".into())),
        ),
        SubmitOutcome::Busy => (
            StatusCode::CONFLICT,
            Json(ApiResponse::error(
                "A reply is still being generated; try again when it finishes".into(),
            )),
        ),
        outcome => (StatusCode::OK, Json(ApiResponse::success(outcome))),
    }
}

/// =============================
/// Memory Endpoints
/// =============================

async fn recall_handler(State(state): State<ApiState>) -> Json<ApiResponse> {
    let memory = state.session.memory();
    let facts = memory.load().await.facts;
    let recall = memory.recall().await;

    Json(ApiResponse::success(serde_json::json!({
        "facts": facts,
        "recall": recall,
    })))
}

async fn remember_handler(
    State(state): State<ApiState>,
    Json(req): Json<RememberRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.fact.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Fact cannot be empty".into())),
        );
    }

    state.session.remember(&req.fact).await;
    let count = state.session.memory().load().await.facts.len();

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({ "stored_facts": count }))),
    )
}

/// =============================
/// Speech Endpoint
/// =============================

async fn stop_speech(State(state): State<ApiState>) -> StatusCode {
    state.session.speech().stop();
    StatusCode::NO_CONTENT
}

/// =============================
/// Router
/// =============================

pub fn create_router(session: Arc<ConversationSession>) -> Router {
    let state = ApiState { session };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/memory", get(recall_handler).post(remember_handler))
        .route("/api/speech/stop", post(stop_speech))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    session: Arc<ConversationSession>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(session);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
