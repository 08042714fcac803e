//! CLI interface for Gondola
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for the web application and
//! the terminal agent runner.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Gondola chat and agent server
///
/// A web application that proxies chat, image, and agent-task requests to
/// a generative backend, with per-session conversation history and a
/// whitelisted command executor.
#[derive(Parser, Debug)]
#[command(name = "gondola")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the web application (the default when no command is given)
    Serve {
        /// Bind address (overrides config)
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Bind port (overrides config)
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,
    },

    /// Run an agent task in the terminal
    Run {
        /// The task to execute
        task: String,

        /// Allow whitelisted commands to run without per-command approval
        #[arg(long)]
        auto_execute: bool,

        /// Model to use (overrides the configured agent model)
        #[arg(long, value_name = "MODEL")]
        model: Option<String>,

        /// Session id to store the conversation under
        #[arg(long, default_value = "cli")]
        session: String,
    },

    /// Show stored conversation turns
    History {
        /// Session id to read
        #[arg(long, default_value = "cli")]
        session: String,

        /// Number of turns to show
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Validate configuration and check dependencies
    Doctor,
}
