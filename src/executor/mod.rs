//! Command execution security module
//!
//! Runs a whitelisted or explicitly approved shell command with a fixed
//! timeout. The whitelist (first whitespace-delimited token, case
//! sensitive) plus the caller-supplied `approved` flag is the entire
//! authorization model: default-deny, approval is an absolute override.
//!
//! This is the system's only privileged boundary. Commands run
//! execve-style (no shell), stdin null, stdout/stderr captured
//! separately, child killed on timeout.

use crate::config::ExecutorConfig;
use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExecError {
    /// First token not whitelisted and no approval given. Nothing ran.
    #[error("Command not allowed.")]
    NotAllowed,

    /// The command ran and exited non-zero.
    #[error("Error: {0}")]
    CommandFailed(String),

    /// The command could not be spawned, or hit the timeout.
    #[error("Execution error: {0}")]
    Launch(String),
}

#[derive(Debug, Clone)]
pub struct CommandExecutor {
    whitelist: HashSet<String>,
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            whitelist: config.whitelist.iter().cloned().collect(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Build an executor with an explicit whitelist and timeout.
    pub fn with_whitelist(commands: Vec<String>, timeout: Duration) -> Self {
        Self {
            whitelist: commands.into_iter().collect(),
            timeout,
        }
    }

    /// Run a command line.
    ///
    /// The line is split with shell quoting rules but executed without a
    /// shell. Execution is allowed only if the first token is whitelisted
    /// or `approved` is true; an empty or unparseable line is denied the
    /// same way as a non-whitelisted one. Returns trimmed stdout on a
    /// zero exit code.
    pub async fn run(&self, command_line: &str, approved: bool) -> Result<String, ExecError> {
        let parts = match shell_words::split(command_line) {
            Ok(parts) => parts,
            Err(_) => return Err(ExecError::NotAllowed),
        };

        let Some(program) = parts.first() else {
            return Err(ExecError::NotAllowed);
        };

        if !approved && !self.whitelist.contains(program) {
            warn!(command = %program, "command denied: not whitelisted and not approved");
            return Err(ExecError::NotAllowed);
        }

        debug!(command = %command_line, approved, "executing command");

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(&parts[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ExecError::Launch(e.to_string())),
            // The timeout drops the output future; kill_on_drop reaps the
            // child rather than leaving it running.
            Err(_) => {
                return Err(ExecError::Launch(format!(
                    "timed out after {} seconds",
                    self.timeout.as_secs()
                )))
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(ExecError::CommandFailed(stderr))
        }
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(&ExecutorConfig::default())
    }
}
