//! Task Decomposer
//!
//! Asks the model to split a goal into an ordered list of typed subtasks
//! using the TEXT:/COMMAND: line grammar.

use super::subtask::{parse_subtask_lines, Subtask};
use crate::gateway::{ChatMessage, GenerationParams, ModelGateway, Result};
use std::sync::Arc;
use tracing::debug;

const DECOMPOSER_SYSTEM_PROMPT: &str =
    "You are an expert at breaking down tasks into clear subtasks.";

pub struct Decomposer {
    gateway: Arc<dyn ModelGateway>,
}

impl Decomposer {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }

    /// Issue one model call and parse the reply into subtasks.
    ///
    /// The list may be empty when the reply used no recognized prefixes;
    /// the loop controller treats an empty initial plan as a failure.
    pub async fn decompose(
        &self,
        task: &str,
        params: &GenerationParams,
        credential: Option<&str>,
    ) -> Result<Vec<Subtask>> {
        let prompt = format!(
            "Decompose the following task into a list of subtasks. \
             Each subtask should be on a new line and start with 'TEXT: ' for text generation \
             tasks or 'COMMAND: ' for commands to execute.\nTask: {}",
            task
        );

        let messages = [
            ChatMessage::system(DECOMPOSER_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        let reply = self.gateway.complete(&messages, params, credential).await?;
        let subtasks = parse_subtask_lines(&reply);

        debug!(count = subtasks.len(), "task decomposed");
        Ok(subtasks)
    }
}
