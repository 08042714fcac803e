//! Subtask types and the TEXT:/COMMAND: line grammar
//!
//! Subtasks are ephemeral: produced from a model reply, consumed within
//! one loop iteration, never persisted.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One unit of work produced by decomposition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubtaskKind {
    /// Text generation, dispatched to the model gateway
    #[serde(rename = "text")]
    Generative,
    /// Shell command, dispatched to the command executor
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subtask {
    #[serde(rename = "type")]
    pub kind: SubtaskKind,
    pub content: String,
}

impl Subtask {
    pub fn generative(content: impl Into<String>) -> Self {
        Self {
            kind: SubtaskKind::Generative,
            content: content.into(),
        }
    }

    pub fn command(content: impl Into<String>) -> Self {
        Self {
            kind: SubtaskKind::Command,
            content: content.into(),
        }
    }
}

/// The outcome of one subtask, accumulated per loop iteration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubtaskResult {
    pub subtask: String,
    pub result: String,
}

/// Parse a model reply into subtasks, line by line.
///
/// Each line is trimmed; a "TEXT:" prefix yields a generative subtask, a
/// "COMMAND:" prefix a command subtask, with the remainder (trimmed) as
/// content. The returned order equals the line order of recognized
/// lines. Lines matching neither prefix contribute nothing; they are
/// counted and logged so the model boundary stays auditable.
pub fn parse_subtask_lines(text: &str) -> Vec<Subtask> {
    let mut subtasks = Vec::new();
    let mut dropped = 0usize;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("TEXT:") {
            subtasks.push(Subtask::generative(rest.trim()));
        } else if let Some(rest) = line.strip_prefix("COMMAND:") {
            subtasks.push(Subtask::command(rest.trim()));
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        debug!(dropped, parsed = subtasks.len(), "unrecognized lines in decomposition reply");
    }

    subtasks
}
