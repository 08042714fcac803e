//! Integration tests for the HTTP surface
//!
//! Each test builds the real router over a temp database and a mock
//! backend, then drives it with in-process requests.

use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::Router;
use gondola::config::Config;
use gondola::db::Database;
use gondola::executor::CommandExecutor;
use gondola::gateway::{ModelGateway, Role, VeniceGateway};
use gondola::history::HistoryManager;
use gondola::web::{self, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestApp {
    router: Router,
    db: Database,
    _temp: TempDir,
}

async fn app(server: &MockServer) -> TestApp {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.backend.base_url = server.uri();
    config.storage.path = temp.path().join("test.db");

    let db = Database::new(&config.storage.path).await.unwrap();
    let gateway: Arc<dyn ModelGateway> = Arc::new(VeniceGateway::new(&config.backend, None));
    let history = Arc::new(HistoryManager::new(db.messages(), config.history.clone()));
    let executor = Arc::new(CommandExecutor::new(&config.executor));

    let state = Arc::new(AppState {
        config: Arc::new(config),
        gateway,
        history,
        executor,
    });

    TestApp {
        router: web::router(state),
        db,
        _temp: temp,
    }
}

async fn post_json(
    router: &Router,
    uri: &str,
    body: Value,
    cookie: Option<&str>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn chat_completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "content": content } }]
    }))
}

#[tokio::test]
async fn test_index_mints_session_cookie() {
    let server = MockServer::start().await;
    let app = app(&server).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .expect("missing session cookie")
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("gondola_session="));
    assert!(cookie.contains("HttpOnly"));

    // A request that already carries the cookie gets no new one.
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/")
                .header(COOKIE, "gondola_session=existing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.headers().get(SET_COOKIE).is_none());

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_execute_denies_unlisted_command() {
    let server = MockServer::start().await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/execute",
        json!({ "command": "rm -rf /tmp/x" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"], "Command not allowed.");

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_execute_runs_whitelisted_command() {
    let server = MockServer::start().await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/execute",
        json!({ "command": "echo web test" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"], "web test");

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_save_message_persists_under_session() {
    let server = MockServer::start().await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/save_message",
        json!({ "role": "assistant", "content": "saved reply" }),
        Some("gondola_session=sess-1"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let messages = app.db.messages().recent("sess-1", 10).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::Assistant);
    assert_eq!(messages[0].content, "saved reply");

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_new_chat_clears_session_history() {
    let server = MockServer::start().await;
    let app = app(&server).await;

    let repo = app.db.messages();
    repo.append("sess-1", Role::User, "old turn").await.unwrap();
    repo.append("sess-2", Role::User, "other session").await.unwrap();

    let (status, body) = post_json(
        &app.router,
        "/new_chat",
        json!({}),
        Some("gondola_session=sess-1"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(repo.recent("sess-1", 10).await.unwrap().is_empty());
    assert_eq!(repo.recent("sess-2", 10).await.unwrap().len(), 1);

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_new_chat_keep_history() {
    let server = MockServer::start().await;
    let app = app(&server).await;

    let repo = app.db.messages();
    repo.append("sess-1", Role::User, "kept").await.unwrap();

    let (_, body) = post_json(
        &app.router,
        "/new_chat",
        json!({ "keep_history": true }),
        Some("gondola_session=sess-1"),
    )
    .await;

    assert_eq!(body["success"], true);
    assert_eq!(repo.recent("sess-1", 10).await.unwrap().len(), 1);

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_chat_text_round_trip_persists_turns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(chat_completion("Hello from the model"))
        .expect(1)
        .mount(&server)
        .await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/chat",
        json!({ "mode": "text", "message": "hi" }),
        Some("gondola_session=sess-1"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Hello from the model");

    let messages = app.db.messages().recent("sess-1", 10).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "hi");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Hello from the model");

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_chat_text_backend_error_rendered_in_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/chat",
        json!({ "mode": "text", "message": "hi" }),
        Some("gondola_session=sess-1"),
    )
    .await;

    // Chat stays HTTP 200; the error is the reply.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Error 500: boom");

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_chat_text_venice_params_suffixes_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "llama-3.3-70b:web" })))
        .respond_with(chat_completion("ok"))
        .expect(1)
        .mount(&server)
        .await;
    let app = app(&server).await;

    let (_, body) = post_json(
        &app.router,
        "/chat",
        json!({ "mode": "text", "message": "hi", "venice_params": "web" }),
        Some("gondola_session=sess-1"),
    )
    .await;
    assert_eq!(body["reply"], "ok");

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_chat_invalid_mode() {
    let server = MockServer::start().await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/chat",
        json!({ "mode": "video", "message": "hi" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Invalid mode specified.");

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_chat_image_returns_data_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/image/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "image": "aGVsbG8=" })))
        .mount(&server)
        .await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/chat",
        json!({ "mode": "image", "message": "a boat", "format": "webp" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["image_url"], "data:image/webp;base64,aGVsbG8=");

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_chat_image_error_rendered_in_url_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/image/generate"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad prompt"))
        .mount(&server)
        .await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/chat",
        json!({ "mode": "image", "prompt": "a boat" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["image_url"], "Error 400: bad prompt");

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_chat_agent_mode_runs_loop() {
    let server = MockServer::start().await;
    // Scripted backend: decomposition, subtask execution, completion check.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(chat_completion("TEXT: say hi"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(chat_completion("hi there"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(chat_completion("COMPLETE"))
        .mount(&server)
        .await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/chat",
        json!({ "mode": "agent", "message": "greet me" }),
        Some("gondola_session=sess-1"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let reply = body["reply"].as_str().unwrap();
    assert!(reply.starts_with("Agent Task Decomposition and Execution Results:"));
    assert!(reply.contains("hi there"));
    assert!(reply.ends_with("Task complete."));

    let messages = app.db.messages().recent("sess-1", 10).await.unwrap();
    assert_eq!(messages.len(), 2);

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_generate_subtasks_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(chat_completion("TEXT: draft a plan\nCOMMAND: pwd"))
        .mount(&server)
        .await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/generate_subtasks",
        json!({ "task": "plan my day" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["subtasks"],
        json!([
            { "type": "text", "content": "draft a plan" },
            { "type": "command", "content": "pwd" }
        ])
    );

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_generate_subtasks_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/generate_subtasks",
        json!({ "task": "plan my day" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "API error: down");

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_check_completion_complete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(chat_completion("COMPLETE"))
        .mount(&server)
        .await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/check_completion",
        json!({
            "task": "plan my day",
            "results": [{ "subtask": "draft a plan", "result": "done" }]
        }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["complete"], true);

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_check_completion_question() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(chat_completion("QUESTION: what time zone?"))
        .mount(&server)
        .await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/check_completion",
        json!({ "task": "plan my day", "results": [] }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["question"], "what time zone?");

    app.db.close().await.unwrap();
}

#[tokio::test]
async fn test_check_completion_protocol_violation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(chat_completion("probably finished"))
        .mount(&server)
        .await;
    let app = app(&server).await;

    let (status, body) = post_json(
        &app.router,
        "/check_completion",
        json!({ "task": "plan my day", "results": [] }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Invalid response from API");

    app.db.close().await.unwrap();
}
