//! Gondola Library
//!
//! This library provides the core functionality of the Gondola chat and
//! agent server. It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Model gateway abstraction and backend client
pub mod gateway;

/// Database persistence module
pub mod db;

/// Conversation history and compaction
pub mod history;

/// Command execution security module
pub mod executor;

/// Agent task loop module
pub mod agent;

/// Web application module
pub mod web;

/// CLI interface
pub mod cli;

/// CLI command handlers
pub mod handlers;

/// Telemetry and logging
pub mod telemetry;
