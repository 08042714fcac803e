// Gondola chat and agent server
// Main entry point for the gondola binary

use clap::Parser;
use gondola::cli::{Cli, Command};
use gondola::handlers::{
    handle_doctor, handle_history, handle_run, handle_serve, load_config, OutputFormat,
};
use gondola::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Basic telemetry first, before config is loaded
    init_telemetry();

    tracing::info!("Gondola v{}", env!("CARGO_PKG_VERSION"));

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = &cli.log {
        config.log_level = level.clone();
    }

    // Re-initialize with the configured level (RUST_LOG still wins)
    init_telemetry_with_level(&config.log_level);

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => handle_serve(config, host, port).await,

        Command::Run {
            task,
            auto_execute,
            model,
            session,
        } => handle_run(task, auto_execute, model, session, &config, format).await,

        Command::History { session, limit } => {
            handle_history(session, limit, &config, format).await
        }

        Command::Doctor => handle_doctor(&config, format).await,
    }
}
