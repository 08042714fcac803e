//! HTTP application: router, shared state, and request handlers
//!
//! Serves the embedded chat page and the JSON API it talks to. All
//! handlers share one [`AppState`]; sessions are partitioned by the
//! `gondola_session` cookie.

use crate::config::Config;
use crate::executor::CommandExecutor;
use crate::gateway::ModelGateway;
use crate::history::HistoryManager;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tracing::info;

pub mod handlers;
pub mod session;
pub mod ui;

pub use session::Session;

/// Everything a request handler needs, shared across requests.
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<dyn ModelGateway>,
    pub history: Arc<HistoryManager>,
    pub executor: Arc<CommandExecutor>,
}

/// Build the application router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/chat", post(handlers::chat))
        .route("/generate_subtasks", post(handlers::generate_subtasks))
        .route("/check_completion", post(handlers::check_completion))
        .route("/save_message", post(handlers::save_message))
        .route("/execute", post(handlers::execute))
        .route("/new_chat", post(handlers::new_chat))
        .with_state(state)
}

/// Bind and serve until the shutdown future resolves.
pub async fn serve(
    state: Arc<AppState>,
    host: &str,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(host, port, "web application listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
