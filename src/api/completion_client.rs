use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::config_manager::ProviderConfig;
use super::data_models::{ChatMessage, ChatRequest, ChatResponse, ErrorResponse};
use super::error_handler::{ChatError, MISSING_CREDENTIAL_MESSAGE};

/// 产生回复原文的一方：上游模型，或本服务的 `/api/chat`
#[async_trait]
pub trait ReplyBackend: Send + Sync {
    /// 发请求前的前置检查（例如凭据是否存在）
    fn ensure_ready(&self) -> Result<(), ChatError> {
        Ok(())
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError>;
}

/// 上游只转发这三个字段
#[derive(Debug, Serialize)]
struct CompletionRequestBody<'a> {
    messages: &'a [ChatMessage],
    model: &'a str,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponseBody {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

fn build_http_client() -> Result<reqwest::Client, ChatError> {
    // 不设任何超时：请求跑到完成或失败为止
    reqwest::Client::builder()
        .build()
        .map_err(|e| ChatError::NetworkError {
            message: e.to_string(),
        })
}

/// OpenAI 兼容的 chat-completions 客户端（非流式，不重试）
pub struct CompletionClient {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl CompletionClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ChatError> {
        Ok(Self {
            config,
            http: build_http_client()?,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// 取第一条 choice 的文本；content 为 null 时返回空串
    pub fn extract_content(body: &str) -> Result<String, ChatError> {
        let parsed: CompletionResponseBody =
            serde_json::from_str(body).map_err(|e| ChatError::ApiError {
                status: 200,
                message: format!("Malformed completion response: {}", e),
            })?;
        let choice = parsed.choices.into_iter().next().ok_or_else(|| ChatError::ApiError {
            status: 200,
            message: "Completion response contained no choices".to_string(),
        })?;
        Ok(choice.message.and_then(|m| m.content).unwrap_or_default())
    }
}

#[async_trait]
impl ReplyBackend for CompletionClient {
    fn ensure_ready(&self) -> Result<(), ChatError> {
        self.config.require_api_key().map(|_| ())
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        // 缺少凭据时直接失败，不发出任何网络请求
        let api_key = self.config.require_api_key()?;

        let url = self.config.completions_url();
        let body = CompletionRequestBody {
            messages: &request.messages,
            model: &request.model,
            temperature: request.temperature,
        };
        debug!(
            "POST {} model={} temperature={} messages={}",
            url,
            request.model,
            request.temperature,
            request.messages.len()
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::from_transport(&e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| ChatError::from_transport(&e))?;

        if !status.is_success() {
            let err = ChatError::from_api_response(status.as_u16(), &text);
            warn!("upstream completion failed: {}", err);
            return Err(err);
        }

        Self::extract_content(&text)
    }
}

/// 交互端调用本服务 `POST /api/chat` 的客户端
pub struct ChatApiClient {
    endpoint: String,
    http: reqwest::Client,
}

impl ChatApiClient {
    pub fn new(server_url: &str) -> Result<Self, ChatError> {
        Ok(Self {
            endpoint: format!("{}/api/chat", server_url.trim_end_matches('/')),
            http: build_http_client()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReplyBackend for ChatApiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::from_transport(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| "服务器错误".to_string());
            // 服务端把"密钥未配置"也作为 500 返回，这里还原成配置错误
            if message == MISSING_CREDENTIAL_MESSAGE {
                return Err(ChatError::ConfigError { message });
            }
            return Err(ChatError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = resp.json().await.map_err(|e| ChatError::ApiError {
            status: status.as_u16(),
            message: format!("Malformed /api/chat response: {}", e),
        })?;
        Ok(body.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// 本地模拟上游：记录请求次数与最后一次请求体，按预设返回
    #[derive(Clone)]
    struct MockUpstream {
        status: StatusCode,
        body: serde_json::Value,
        calls: Arc<AtomicU32>,
        last_request: Arc<std::sync::Mutex<Option<(Option<String>, serde_json::Value)>>>,
    }

    async fn mock_completions(
        State(mock): State<MockUpstream>,
        headers: axum::http::HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        mock.calls.fetch_add(1, Ordering::SeqCst);
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        *mock.last_request.lock().unwrap() = Some((auth, body));
        (mock.status, Json(mock.body.clone()))
    }

    async fn spawn_mock(status: StatusCode, body: serde_json::Value) -> (String, MockUpstream) {
        let mock = MockUpstream {
            status,
            body,
            calls: Arc::new(AtomicU32::new(0)),
            last_request: Arc::new(std::sync::Mutex::new(None)),
        };
        let app = Router::new()
            .route("/chat/completions", post(mock_completions))
            .with_state(mock.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), mock)
    }

    fn provider(base_url: &str, key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            api_key: key.map(|k| k.to_string()),
            base_url: base_url.to_string(),
            model: "deepseek-chat".to_string(),
        }
    }

    fn sample_request() -> ChatRequest {
        ChatRequest::new(vec![
            ChatMessage::system("你是刚认识阶段的聊天助手。"),
            ChatMessage::user("今天天气真不错呢～"),
        ])
    }

    #[test]
    fn test_extract_content_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"A\nB\nC"}},{"message":{"content":"ignored"}}]}"#;
        assert_eq!(CompletionClient::extract_content(body).unwrap(), "A\nB\nC");
    }

    #[test]
    fn test_extract_content_null_is_empty() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(CompletionClient::extract_content(body).unwrap(), "");
    }

    #[test]
    fn test_extract_content_no_choices_is_error() {
        assert!(matches!(
            CompletionClient::extract_content(r#"{"choices":[]}"#),
            Err(ChatError::ApiError { .. })
        ));
        assert!(CompletionClient::extract_content("not json").is_err());
    }

    #[tokio::test]
    async fn test_complete_success_forwards_only_known_fields() {
        let (url, mock) = spawn_mock(
            StatusCode::OK,
            serde_json::json!({"choices":[{"message":{"content":"A\nB\nC"}}]}),
        )
        .await;
        let client = CompletionClient::new(provider(&url, Some("sk-test"))).unwrap();

        let content = client.complete(&sample_request()).await.unwrap();
        assert_eq!(content, "A\nB\nC");
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);

        let (auth, body) = mock.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        let obj = body.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["messages", "model", "temperature"]);
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[tokio::test]
    async fn test_complete_missing_key_makes_no_call() {
        let (url, mock) = spawn_mock(StatusCode::OK, serde_json::json!({"choices":[]})).await;
        let client = CompletionClient::new(provider(&url, None)).unwrap();

        let result = client.complete(&sample_request()).await;
        assert!(matches!(result, Err(ChatError::ConfigError { .. })));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_complete_non_success_is_api_error() {
        let (url, _mock) = spawn_mock(
            StatusCode::UNAUTHORIZED,
            serde_json::json!({"error":{"message":"Authentication Fails"}}),
        )
        .await;
        let client = CompletionClient::new(provider(&url, Some("sk-bad"))).unwrap();

        match client.complete(&sample_request()).await {
            Err(ChatError::ApiError { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Authentication Fails");
            }
            other => panic!("Expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_unreachable_is_network_error() {
        // 绑定后立即释放端口，保证无人监听
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            CompletionClient::new(provider(&format!("http://{}", addr), Some("sk-test"))).unwrap();
        let result = client.complete(&sample_request()).await;
        assert!(matches!(result, Err(ChatError::NetworkError { .. })));
    }

    #[test]
    fn test_chat_api_client_endpoint() {
        let client = ChatApiClient::new("http://127.0.0.1:3000/").unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:3000/api/chat");
    }
}
