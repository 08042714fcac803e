//! Completion Checker
//!
//! Classifies the state of an agent task after an iteration's subtask
//! results: complete, needs more subtasks, or needs user clarification.
//! The model's reply is matched by case-insensitive prefix; anything
//! outside the three recognized prefixes is a protocol violation, the
//! one condition fatal to the current task.

use super::subtask::{parse_subtask_lines, Subtask, SubtaskResult};
use crate::gateway::{ChatMessage, GatewayError, GenerationParams, ModelGateway};
use std::sync::Arc;
use tracing::debug;

const CHECKER_SYSTEM_PROMPT: &str =
    "You are an assistant that checks task completion and manages workflow.";

/// Classification of one check call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The task's goal is satisfied.
    Done,
    /// More subtasks are needed; replaces the current plan.
    Continue(Vec<Subtask>),
    /// The model needs clarification from the user.
    AskUser(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Reply matched none of the recognized prefixes.
    #[error("invalid completion-check reply: {0}")]
    Protocol(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub struct CompletionChecker {
    gateway: Arc<dyn ModelGateway>,
}

impl CompletionChecker {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }

    /// Issue one model call and classify the reply.
    ///
    /// `answer` carries the user's reply to a previous QUESTION, when one
    /// was asked and answered.
    pub async fn check(
        &self,
        task: &str,
        results: &[SubtaskResult],
        params: &GenerationParams,
        credential: Option<&str>,
        answer: Option<&str>,
    ) -> Result<Verdict, CheckError> {
        let results_str = results
            .iter()
            .map(|res| format!("Subtask: {}\nResult: {}", res.subtask, res.result))
            .collect::<Vec<_>>()
            .join("\n");

        let mut prompt = format!(
            "Based on the following task and the results of the subtasks, determine if the task \
             is complete.\n\
             If it is, respond with 'COMPLETE'.\n\
             If more subtasks are needed, respond with 'MORE_SUBTASKS: ' followed by the new \
             subtasks, each on a new line starting with 'TEXT: ' or 'COMMAND: '.\n\
             If you need clarification from the user, respond with 'QUESTION: ' followed by the \
             question.\n\
             Task: {}\n\
             Subtask results:\n{}",
            task, results_str
        );
        if let Some(answer) = answer {
            prompt.push_str(&format!(
                "\nUser's answer to the previous question: {}",
                answer
            ));
        }

        let messages = [
            ChatMessage::system(CHECKER_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        let reply = self.gateway.complete(&messages, params, credential).await?;
        classify_reply(&reply)
    }
}

/// Classify a trimmed checker reply by case-insensitive prefix.
pub fn classify_reply(reply: &str) -> Result<Verdict, CheckError> {
    let trimmed = reply.trim();

    if strip_prefix_ci(trimmed, "COMPLETE").is_some() {
        debug!("checker verdict: done");
        Ok(Verdict::Done)
    } else if let Some(remainder) = strip_prefix_ci(trimmed, "MORE_SUBTASKS:") {
        let subtasks = parse_subtask_lines(remainder);
        debug!(count = subtasks.len(), "checker verdict: continue");
        Ok(Verdict::Continue(subtasks))
    } else if let Some(remainder) = strip_prefix_ci(trimmed, "QUESTION:") {
        debug!("checker verdict: ask user");
        Ok(Verdict::AskUser(remainder.trim().to_string()))
    } else {
        Err(CheckError::Protocol(trimmed.to_string()))
    }
}

/// ASCII case-insensitive prefix strip. Returns None (rather than
/// slicing mid-character) when the input is shorter than the prefix or
/// doesn't land on a char boundary.
fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let candidate = s.get(..prefix.len())?;
    candidate
        .eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}
