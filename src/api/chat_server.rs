use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{info, warn};
use serde::Deserialize;

use super::completion_client::ReplyBackend;
use super::data_models::{
    ChatMessage, ChatRequest, ChatResponse, ErrorResponse, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
};
use super::error_handler::{ChatError, GENERIC_FAILURE_MESSAGE, MISSING_CREDENTIAL_MESSAGE};

#[derive(Clone)]
pub struct ServerState {
    backend: Arc<dyn ReplyBackend>,
    /// 请求体未给出 `model` 时使用
    model: String,
}

impl ServerState {
    pub fn new(backend: Arc<dyn ReplyBackend>) -> Self {
        Self {
            backend,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// `/api/chat` 的原始请求体，`model` 与 `temperature` 可省略
#[derive(Debug, Deserialize)]
struct ChatRequestBody {
    messages: Vec<ChatMessage>,
    model: Option<String>,
    temperature: Option<f32>,
}

impl ChatRequestBody {
    fn into_request(self, default_model: &str) -> ChatRequest {
        ChatRequest {
            messages: self.messages,
            model: self.model.unwrap_or_else(|| default_model.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        }
    }
}

fn error_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// `POST /api/chat`
///
/// 先检查凭据，再解析请求体，最后调用上游。任何失败都返回 500：
/// 凭据缺失给出专门提示，其余一律为通用提示。
async fn chat_handler(
    State(state): State<ServerState>,
    payload: Result<Json<ChatRequestBody>, JsonRejection>,
) -> Response {
    if let Err(err) = state.backend.ensure_ready() {
        warn!("/api/chat rejected: {}", err);
        return error_response(MISSING_CREDENTIAL_MESSAGE);
    }

    let request = match payload {
        Ok(Json(body)) => body.into_request(&state.model),
        Err(rejection) => {
            warn!("/api/chat bad request body: {}", rejection);
            return error_response(GENERIC_FAILURE_MESSAGE);
        }
    };

    info!(
        "/api/chat model={} temperature={} messages={}",
        request.model,
        request.temperature,
        request.messages.len()
    );

    match state.backend.complete(&request).await {
        Ok(content) => (StatusCode::OK, Json(ChatResponse { content })).into_response(),
        Err(ChatError::ConfigError { .. }) => error_response(MISSING_CREDENTIAL_MESSAGE),
        Err(err) => {
            warn!("API调用错误: {}", err);
            error_response(GENERIC_FAILURE_MESSAGE)
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}
