//! Request handlers for the JSON API
//!
//! Bodies are lenient: missing fields fall back to configured defaults,
//! matching what the chat page has always sent. Chat-mode replies are
//! HTTP 200 even on backend failure, with the error rendered into the
//! reply payload; the subtask and completion endpoints use HTTP 500
//! with an `error` field instead.

use super::session::Session;
use super::{ui, AppState};
use crate::agent::{
    AgentController, AutoExecutePolicy, CheckError, CompletionChecker, Decomposer, SubtaskResult,
    Verdict,
};
use crate::config::GenerationConfig;
use crate::gateway::{
    render_chat_error, GatewayError, GenerationParams, ImageFormat, ImageRequest, Role,
};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Per-request overrides of the configured generation defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SamplingOverrides {
    model: Option<String>,
    temperature: Option<f64>,
    top_p: Option<f64>,
    max_tokens: Option<u32>,
    presence_penalty: Option<f64>,
    frequency_penalty: Option<f64>,
    api_key: Option<String>,
}

impl SamplingOverrides {
    fn params(&self, default_model: &str, defaults: &GenerationConfig) -> GenerationParams {
        GenerationParams {
            model: self
                .model
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| default_model.to_string()),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            presence_penalty: self.presence_penalty.unwrap_or(defaults.presence_penalty),
            frequency_penalty: self.frequency_penalty.unwrap_or(defaults.frequency_penalty),
        }
    }

    fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

fn lenient<T: Default + for<'de> Deserialize<'de>>(body: &Value) -> T {
    serde_json::from_value(body.clone()).unwrap_or_default()
}

fn gateway_error_response(err: &GatewayError) -> Response {
    let message = match err {
        GatewayError::Status { body, .. } => format!("API error: {}", body),
        other => format!("Exception: {}", other),
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

/// GET / — the embedded chat page.
pub async fn index(headers: HeaderMap) -> Response {
    let session = Session::extract(&headers);
    let mut response = Html(ui::INDEX_HTML).into_response();
    session.apply(response.headers_mut());
    response
}

/// POST /chat — dispatch on `mode`.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let session = Session::extract(&headers);
    let mode = body.get("mode").and_then(Value::as_str).unwrap_or("text");
    debug!(mode, session = %session.id, "chat request");

    let mut response = match mode {
        "text" => chat_text(&state, &session, &body).await,
        "image" => chat_image(&state, &body).await,
        "agent" => chat_agent(&state, &session, &body).await,
        _ => Json(json!({ "reply": "Invalid mode specified." })).into_response(),
    };
    session.apply(response.headers_mut());
    response
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TextRequest {
    message: String,
    system_prompt: Option<String>,
    venice_params: Option<String>,
    #[serde(flatten)]
    sampling: SamplingOverrides,
}

async fn chat_text(state: &AppState, session: &Session, body: &Value) -> Response {
    let req: TextRequest = lenient(body);
    let mut params = req
        .sampling
        .params(&state.config.backend.chat_model, &state.config.generation);
    if let Some(extra) = req.venice_params.as_deref().filter(|v| !v.is_empty()) {
        params.model = format!("{}:{}", params.model, extra);
    }
    let system_prompt = req
        .system_prompt
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
    let credential = req.sampling.credential();

    if let Err(err) = state
        .history
        .append(&session.id, Role::User, &req.message)
        .await
    {
        warn!(error = %err, "failed to persist user message");
    }
    let history = match state.history.recent(&session.id).await {
        Ok(rows) => rows,
        Err(err) => {
            warn!(error = %err, "failed to load history, continuing without it");
            Vec::new()
        }
    };

    let assembled = state
        .history
        .assemble_context(
            state.gateway.as_ref(),
            &system_prompt,
            &history,
            &req.message,
            &params,
            credential,
        )
        .await;

    let reply = match state.gateway.complete(&assembled, &params, credential).await {
        Ok(text) => text,
        Err(err) => render_chat_error(&err),
    };

    if let Err(err) = state
        .history
        .append(&session.id, Role::Assistant, &reply)
        .await
    {
        warn!(error = %err, "failed to persist assistant reply");
    }

    Json(json!({ "reply": reply })).into_response()
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ImageModeRequest {
    prompt: Option<String>,
    message: String,
    model: Option<String>,
    image_height: Option<u32>,
    image_width: Option<u32>,
    steps: Option<u32>,
    format: Option<String>,
    hide_watermark: bool,
    embed_exif_metadata: bool,
    negative_prompt: String,
    cfg_scale: Option<f64>,
    lora_strength: Option<f64>,
    seed: Option<Value>,
    inpaint: Option<Value>,
    api_key: Option<String>,
}

async fn chat_image(state: &AppState, body: &Value) -> Response {
    let req: ImageModeRequest = lenient(body);
    let prompt = req.prompt.unwrap_or(req.message);
    let model = req
        .model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| state.config.backend.image_model.clone());

    let mut request = ImageRequest::new(model, prompt);
    if let Some(height) = req.image_height {
        request.height = height;
    }
    if let Some(width) = req.image_width {
        request.width = width;
    }
    if let Some(steps) = req.steps {
        request.steps = steps;
    }
    request.format = match req.format.as_deref() {
        Some("webp") => ImageFormat::Webp,
        Some("jpg") => ImageFormat::Jpg,
        _ => ImageFormat::Png,
    };
    request.hide_watermark = req.hide_watermark;
    request.embed_exif_metadata = req.embed_exif_metadata;
    request.negative_prompt = req.negative_prompt;
    if let Some(cfg_scale) = req.cfg_scale {
        request.cfg_scale = cfg_scale;
    }
    if let Some(lora_strength) = req.lora_strength {
        request.lora_strength = lora_strength;
    }
    request.seed = parse_seed(req.seed.as_ref());
    request.inpaint = req.inpaint;

    let credential = req.api_key.as_deref().filter(|k| !k.is_empty());

    // Always HTTP 200; failures are rendered into the image_url field the
    // way the page expects.
    let image_url = match state.gateway.generate_image(&request, credential).await {
        Ok(reply) => reply.data_url(),
        Err(GatewayError::Status { status, body }) => format!("Error {}: {}", status, body),
        Err(GatewayError::Backend(message)) => format!("Error: {}", message),
        Err(err) => format!("Exception occurred: {}", err),
    };

    Json(json!({ "image_url": image_url })).into_response()
}

/// The page sends seed as a string; accept a bare number too.
fn parse_seed(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct AgentModeRequest {
    message: String,
    auto_execute: bool,
    #[serde(flatten)]
    sampling: SamplingOverrides,
}

async fn chat_agent(state: &AppState, session: &Session, body: &Value) -> Response {
    let req: AgentModeRequest = lenient(body);
    let params = req
        .sampling
        .params(&state.config.backend.agent_model, &state.config.generation);
    let credential = req.sampling.credential();

    if let Err(err) = state
        .history
        .append(&session.id, Role::User, &req.message)
        .await
    {
        warn!(error = %err, "failed to persist user message");
    }

    let controller = AgentController::new(
        Arc::clone(&state.gateway),
        Arc::clone(&state.executor),
        state.config.agent.max_iterations,
    );
    let policy = AutoExecutePolicy {
        enabled: req.auto_execute,
    };
    // No clarification source over HTTP: a question ends the run and is
    // surfaced in the transcript.
    let outcome = controller
        .run(&req.message, &params, credential, &policy, None)
        .await;
    let reply = outcome.render_transcript();

    if let Err(err) = state
        .history
        .append(&session.id, Role::Assistant, &reply)
        .await
    {
        warn!(error = %err, "failed to persist agent reply");
    }

    Json(json!({ "reply": reply })).into_response()
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SubtaskRequest {
    task: String,
    #[serde(flatten)]
    sampling: SamplingOverrides,
}

/// POST /generate_subtasks
pub async fn generate_subtasks(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    let req: SubtaskRequest = lenient(&body);
    let params = req
        .sampling
        .params(&state.config.backend.agent_model, &state.config.generation);

    let decomposer = Decomposer::new(Arc::clone(&state.gateway));
    match decomposer
        .decompose(&req.task, &params, req.sampling.credential())
        .await
    {
        Ok(subtasks) => Json(json!({ "subtasks": subtasks })).into_response(),
        Err(err) => gateway_error_response(&err),
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CheckRequest {
    task: String,
    results: Vec<SubtaskResult>,
    answer: String,
    #[serde(flatten)]
    sampling: SamplingOverrides,
}

/// POST /check_completion
pub async fn check_completion(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    let req: CheckRequest = lenient(&body);
    let params = req
        .sampling
        .params(&state.config.backend.agent_model, &state.config.generation);
    let answer = Some(req.answer.as_str()).filter(|a| !a.is_empty());

    let checker = CompletionChecker::new(Arc::clone(&state.gateway));
    match checker
        .check(
            &req.task,
            &req.results,
            &params,
            req.sampling.credential(),
            answer,
        )
        .await
    {
        Ok(Verdict::Done) => Json(json!({ "complete": true })).into_response(),
        Ok(Verdict::Continue(subtasks)) => Json(json!({ "subtasks": subtasks })).into_response(),
        Ok(Verdict::AskUser(question)) => Json(json!({ "question": question })).into_response(),
        Err(CheckError::Protocol(reply)) => {
            error!(reply = %reply, "invalid response from completion check");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Invalid response from API" })),
            )
                .into_response()
        }
        Err(CheckError::Gateway(err)) => gateway_error_response(&err),
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveMessageRequest {
    #[serde(default = "default_role")]
    role: String,
    #[serde(default)]
    content: String,
}

fn default_role() -> String {
    "user".to_string()
}

/// POST /save_message
pub async fn save_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SaveMessageRequest>,
) -> Response {
    let session = Session::extract(&headers);
    let role = Role::parse(&req.role).unwrap_or(Role::User);

    let mut response = match state.history.append(&session.id, role, &req.content).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(err) => {
            error!(error = %err, "failed to save message");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    };
    session.apply(response.headers_mut());
    response
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ExecuteRequest {
    command: String,
    approved: bool,
}

/// POST /execute — always HTTP 200; errors render into the output field.
pub async fn execute(State(state): State<Arc<AppState>>, Json(req): Json<ExecuteRequest>) -> Response {
    let output = match state.executor.run(&req.command, req.approved).await {
        Ok(stdout) => stdout,
        Err(err) => err.to_string(),
    };
    Json(json!({ "output": output })).into_response()
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct NewChatRequest {
    keep_history: bool,
}

/// POST /new_chat
pub async fn new_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewChatRequest>,
) -> Response {
    let session = Session::extract(&headers);

    let mut response = if req.keep_history {
        Json(json!({ "success": true })).into_response()
    } else {
        match state.history.clear(&session.id).await {
            Ok(()) => Json(json!({ "success": true })).into_response(),
            Err(err) => {
                error!(error = %err, "failed to clear session history");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": err.to_string() })),
                )
                    .into_response()
            }
        }
    };
    session.apply(response.headers_mut());
    response
}
