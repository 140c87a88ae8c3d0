//! 端到端：模拟上游 + 真实 `/api/chat` 服务 + 交互层
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use lovechat::api::chat_server::{router, ServerState};
use lovechat::api::completion_client::{ChatApiClient, CompletionClient};
use lovechat::api::config_manager::ProviderConfig;
use lovechat::api::data_models::{Gender, IntimacyLevel, ReplySet};
use lovechat::api::error_handler::{ChatError, GENERIC_FAILURE_MESSAGE, MISSING_CREDENTIAL_MESSAGE};
use lovechat::api::history_store::HistoryStore;
use lovechat::api::reply_engine::ReplyEngine;
use lovechat::api::typewriter::{ReplySlots, RevealOutcome, Typewriter};

#[derive(Clone)]
struct Upstream {
    status: StatusCode,
    body: serde_json::Value,
    calls: Arc<AtomicU32>,
}

async fn completions(
    State(upstream): State<Upstream>,
    Json(_body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    upstream.calls.fetch_add(1, Ordering::SeqCst);
    (upstream.status, Json(upstream.body.clone()))
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_upstream(status: StatusCode, body: serde_json::Value) -> (String, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let app = Router::new()
        .route("/chat/completions", post(completions))
        .with_state(Upstream {
            status,
            body,
            calls: calls.clone(),
        });
    (serve(app).await, calls)
}

async fn spawn_server(upstream_url: &str, api_key: Option<&str>) -> String {
    let client = CompletionClient::new(ProviderConfig {
        api_key: api_key.map(|k| k.to_string()),
        base_url: upstream_url.to_string(),
        model: "deepseek-chat".to_string(),
    })
    .unwrap();
    serve(router(ServerState::new(Arc::new(client)))).await
}

fn engine(server_url: &str, dir: &TempDir) -> ReplyEngine {
    let backend = ChatApiClient::new(server_url).unwrap();
    ReplyEngine::new(Arc::new(backend), HistoryStore::load(dir.path()))
        .with_typewriter(Typewriter::instant())
}

#[tokio::test]
async fn replies_flow_through_server_into_history() {
    let (upstream, calls) = spawn_upstream(
        StatusCode::OK,
        serde_json::json!({"choices":[{"message":{"role":"assistant","content":"1. 是呀\n\n2. 想和你一起晒太阳\n3. 那出去走走？\n4. 多余的一条"}}]}),
    )
    .await;
    let server = spawn_server(&upstream, Some("sk-test")).await;
    let tmp = TempDir::new().unwrap();
    let mut engine = engine(&server, &tmp);
    let mut slots = ReplySlots::new();

    let outcome = tokio_test::assert_ok!(
        engine
            .generate(
                "今天天气真不错呢～",
                IntimacyLevel::new(1),
                Gender::Male,
                &mut slots,
                &CancellationToken::new(),
            )
            .await
    );

    assert!(outcome.is_success());
    assert_eq!(outcome.reveal, RevealOutcome::Completed);
    assert_eq!(
        outcome.replies.as_slice(),
        ["1. 是呀", "2. 想和你一起晒太阳", "3. 那出去走走？"]
    );
    assert_eq!(slots.slots().as_slice(), outcome.replies.as_slice());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let reloaded = HistoryStore::load(tmp.path());
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.entries()[0].input, "今天天气真不错呢～");
    assert_eq!(reloaded.entries()[0].replies, outcome.replies);
}

#[tokio::test]
async fn missing_key_surfaces_as_config_error() {
    let (upstream, calls) = spawn_upstream(StatusCode::OK, serde_json::json!({"choices":[]})).await;
    let server = spawn_server(&upstream, None).await;
    let tmp = TempDir::new().unwrap();
    let mut engine = engine(&server, &tmp);

    let outcome = engine
        .generate(
            "在干嘛",
            IntimacyLevel::new(6),
            Gender::Female,
            &mut ReplySlots::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    match &outcome.error {
        Some(err @ ChatError::ConfigError { .. }) => {
            assert_eq!(err.user_message(), MISSING_CREDENTIAL_MESSAGE)
        }
        other => panic!("Expected ConfigError, got {:?}", other),
    }
    assert_eq!(outcome.replies, ReplySet::error_fallback());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(HistoryStore::load(tmp.path()).is_empty());
}

#[tokio::test]
async fn upstream_failure_shows_fallback_without_saving() {
    let (upstream, calls) = spawn_upstream(
        StatusCode::SERVICE_UNAVAILABLE,
        serde_json::json!({"error":{"message":"overloaded"}}),
    )
    .await;
    let server = spawn_server(&upstream, Some("sk-test")).await;
    let tmp = TempDir::new().unwrap();
    let mut engine = engine(&server, &tmp);
    let mut slots = ReplySlots::new();

    let outcome = engine
        .generate(
            "晚安",
            IntimacyLevel::new(10),
            Gender::Male,
            &mut slots,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let err = outcome.error.clone().unwrap();
    assert!(matches!(err, ChatError::ApiError { status: 500, .. }));
    assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    assert_eq!(slots.slots().as_slice(), ReplySet::error_fallback().as_slice());
    assert!(!outcome.saved);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(HistoryStore::load(tmp.path()).is_empty());
}

#[tokio::test]
async fn server_unreachable_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let tmp = TempDir::new().unwrap();
    let mut engine = engine(&format!("http://{}", addr), &tmp);

    let outcome = engine
        .generate(
            "hi",
            IntimacyLevel::default(),
            Gender::Male,
            &mut ReplySlots::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(matches!(outcome.error, Some(ChatError::NetworkError { .. })));
    assert_eq!(outcome.replies, ReplySet::error_fallback());
}
