//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - serve: run the web application
//! - run: execute an agent task in the terminal
//! - history: show stored conversation turns
//! - doctor: validate configuration and check dependencies

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::io::Write as _;
use std::sync::Arc;

use crate::agent::{AgentController, AutoExecutePolicy, ClarificationSource, TaskOutcome};
use crate::config::Config;
use crate::db::Database;
use crate::executor::CommandExecutor;
use crate::gateway::{GenerationParams, ModelGateway, Role, VeniceGateway};
use crate::history::HistoryManager;
use crate::web::{self, AppState};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Run the web application until ctrl-c.
pub async fn handle_serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let db = Database::new(&config.storage.path).await?;
    let gateway: Arc<dyn ModelGateway> =
        Arc::new(VeniceGateway::new(&config.backend, config.resolve_api_key()));
    let history = Arc::new(HistoryManager::new(db.messages(), config.history.clone()));
    let executor = Arc::new(CommandExecutor::new(&config.executor));

    let state = Arc::new(AppState {
        config: Arc::new(config),
        gateway,
        history,
        executor,
    });

    web::serve(state, &host, port, shutdown_signal()).await?;

    tracing::info!("shutting down, flushing database");
    if let Err(e) = db.flush_wal().await {
        tracing::warn!(error = %e, "WAL checkpoint failed on shutdown");
    }
    db.close().await?;
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
}

/// Answers clarification questions from stdin. An empty line declines,
/// which ends the run as NeedsClarification.
struct StdinClarifier;

#[async_trait]
impl ClarificationSource for StdinClarifier {
    async fn answer(&self, question: &str) -> Option<String> {
        println!();
        println!("Question: {}", question);
        print!("Answer (empty line to stop): ");
        std::io::stdout().flush().ok();

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await
        .ok()?
        .ok()?;

        let trimmed = line.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Run an agent task in the terminal and persist the turn.
pub async fn handle_run(
    task: String,
    auto_execute: bool,
    model: Option<String>,
    session: String,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let db = Database::new(&config.storage.path).await?;
    let gateway: Arc<dyn ModelGateway> =
        Arc::new(VeniceGateway::new(&config.backend, config.resolve_api_key()));
    let executor = Arc::new(CommandExecutor::new(&config.executor));
    let history = HistoryManager::new(db.messages(), config.history.clone());

    let model = model.unwrap_or_else(|| config.backend.agent_model.clone());
    let params = GenerationParams::for_model(model, &config.generation);
    let policy = AutoExecutePolicy {
        enabled: auto_execute,
    };
    let clarifier = StdinClarifier;

    if let OutputFormat::Text = format {
        println!("Executing task: {}", task);
        println!();
    }

    history.append(&session, Role::User, &task).await?;

    let controller = AgentController::new(gateway, executor, config.agent.max_iterations);
    let outcome = controller
        .run(&task, &params, None, &policy, Some(&clarifier))
        .await;
    let transcript = outcome.render_transcript();

    history.append(&session, Role::Assistant, &transcript).await?;
    db.flush_wal().await.ok();
    db.close().await?;

    let status = match &outcome {
        TaskOutcome::Done(_) => "complete",
        TaskOutcome::NeedsClarification { .. } => "needs_clarification",
        TaskOutcome::Failed { .. } => "failed",
    };

    match format {
        OutputFormat::Text => {
            println!("{}", transcript);
            println!();
            println!(
                "Status: {} ({} iteration{})",
                status,
                outcome.report().iterations,
                if outcome.report().iterations == 1 { "" } else { "s" }
            );
        }
        OutputFormat::Json => {
            let output = json!({
                "task": task,
                "status": status,
                "iterations": outcome.report().iterations,
                "reply": transcript,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Show stored conversation turns for a session.
pub async fn handle_history(
    session: String,
    limit: u32,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let db = Database::new(&config.storage.path).await?;
    let messages = db.messages().recent(&session, limit).await?;
    db.close().await?;

    match format {
        OutputFormat::Text => {
            if messages.is_empty() {
                println!("No messages for session '{}'", session);
                return Ok(());
            }
            println!("History for session '{}' (last {}):", session, limit);
            println!();
            for msg in &messages {
                let when = chrono::DateTime::from_timestamp(msg.created_at, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| msg.created_at.to_string());
                println!("[{}] {}: {}", when, msg.role, msg.content);
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "session": session,
                "messages": messages
                    .iter()
                    .map(|m| json!({
                        "role": m.role.as_str(),
                        "content": m.content,
                        "created_at": m.created_at,
                    }))
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Validate configuration and check dependencies.
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut checks: Vec<(&str, String)> = Vec::new();
    let mut issues: Vec<String> = Vec::new();

    // Config was validated on load; reaching this point means it parsed.
    checks.push(("Configuration", "Valid".to_string()));

    let config_path = Config::default_config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    checks.push(("Config path", config_path));

    match config.storage.path.parent() {
        Some(dir) if dir.exists() => {
            checks.push(("Data directory", "Exists".to_string()));
        }
        Some(dir) => {
            checks.push(("Data directory", "Missing".to_string()));
            issues.push(format!(
                "Data directory does not exist yet: {} (created on first run)",
                dir.display()
            ));
        }
        None => {
            checks.push(("Data directory", "Unknown".to_string()));
        }
    }

    match Database::new(&config.storage.path).await {
        Ok(db) => {
            checks.push(("Database connection", "OK".to_string()));
            db.close().await.ok();
        }
        Err(e) => {
            checks.push(("Database connection", "Failed".to_string()));
            issues.push(format!("Cannot open database: {}", e));
        }
    }

    if config.resolve_api_key().is_some() {
        checks.push(("API key", "Configured".to_string()));
    } else {
        checks.push(("API key", "Not configured".to_string()));
        issues.push(
            "No API key found. Set VENICE_API_KEY or add api_key to the [backend] config section."
                .to_string(),
        );
    }

    checks.push(("Backend URL", config.backend.base_url.clone()));

    match format {
        OutputFormat::Text => {
            println!("Gondola Doctor");
            println!();
            for (name, status) in &checks {
                println!("  {:22} {}", name, status);
            }
            if issues.is_empty() {
                println!();
                println!("✓ All checks passed");
            } else {
                println!();
                println!("Issues found:");
                for issue in &issues {
                    println!("  ✗ {}", issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks
                    .iter()
                    .map(|(name, status)| json!({ "name": name, "status": status }))
                    .collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Resolve the config for a run, honoring the global `--config` override.
pub fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::load_or_create(),
    }
}
