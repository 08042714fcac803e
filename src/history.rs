//! History Manager
//!
//! Maintains the session-scoped conversation window used for prompt
//! context: a recent-message fetch, a word-count size estimate, and a
//! lossy summarization compaction that keeps the context under the
//! configured threshold.

use crate::config::HistoryConfig;
use crate::db::{MessageRepository, StoredMessage};
use crate::gateway::{ChatMessage, GatewayError, GenerationParams, ModelGateway, Role};
use anyhow::Result;
use tracing::{debug, warn};

/// Fallback replies when the summarization call fails. Summarize is
/// total: callers always get a string.
const SUMMARY_API_ERROR: &str = "Summary unavailable due to an API error.";
const SUMMARY_EXCEPTION: &str = "Summary unavailable due to an exception.";

/// Estimate the prompt load of a message list as the total
/// whitespace-delimited word count. A proxy for token count, not exact.
pub fn estimate_size(messages: &[ChatMessage]) -> usize {
    messages
        .iter()
        .map(|msg| msg.content.split_whitespace().count())
        .sum()
}

/// Compaction triggers only when the size estimate exceeds the threshold
/// AND more than one prior message exists; a single oversized message is
/// left alone since summarizing it buys nothing.
pub fn compaction_needed(
    assembled: &[ChatMessage],
    history_len: usize,
    threshold: usize,
) -> bool {
    estimate_size(assembled) > threshold && history_len > 1
}

pub struct HistoryManager {
    messages: MessageRepository,
    config: HistoryConfig,
}

impl HistoryManager {
    pub fn new(messages: MessageRepository, config: HistoryConfig) -> Self {
        Self { messages, config }
    }

    /// Append one turn to a session's log.
    pub async fn append(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        self.messages.append(session_id, role, content).await
    }

    /// The configured recent window, in chronological order.
    pub async fn recent(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        self.messages
            .recent(session_id, self.config.recent_limit)
            .await
    }

    /// Delete a session's log entirely.
    pub async fn clear(&self, session_id: &str) -> Result<()> {
        self.messages.clear(session_id).await
    }

    /// Whether the assembled context needs compaction.
    pub fn needs_compaction(&self, assembled: &[ChatMessage], history_len: usize) -> bool {
        compaction_needed(assembled, history_len, self.config.summary_threshold)
    }

    /// Summarize a conversation window with one gateway call.
    ///
    /// Temperature is fixed at 0.5 and the reply is capped at the
    /// configured summary token budget regardless of the caller's max;
    /// the remaining sampling knobs come from the caller. Never fails:
    /// gateway errors collapse to a fixed fallback string.
    pub async fn summarize(
        &self,
        gateway: &dyn ModelGateway,
        history: &[StoredMessage],
        params: &GenerationParams,
        credential: Option<&str>,
    ) -> String {
        let conversation_text = history
            .iter()
            .map(|msg| format!("{}: {}", msg.role, msg.content))
            .collect::<Vec<_>>()
            .join("\n");

        let messages = [
            ChatMessage::system("You are a summarization assistant."),
            ChatMessage::user(format!(
                "Summarize the following conversation concisely:\n{}",
                conversation_text
            )),
        ];

        let summary_params = GenerationParams {
            model: params.model.clone(),
            temperature: 0.5,
            top_p: params.top_p,
            max_tokens: self.config.summary_max_tokens,
            presence_penalty: params.presence_penalty,
            frequency_penalty: params.frequency_penalty,
        };

        match gateway
            .complete(&messages, &summary_params, credential)
            .await
        {
            Ok(summary) => {
                debug!(words = summary.split_whitespace().count(), "history summarized");
                summary
            }
            Err(GatewayError::Status { status, .. }) => {
                warn!(status, "summarization failed with backend status");
                SUMMARY_API_ERROR.to_string()
            }
            Err(err) => {
                warn!(error = %err, "summarization failed");
                SUMMARY_EXCEPTION.to_string()
            }
        }
    }

    /// Assemble the prompt context for a chat turn, compacting if needed.
    ///
    /// Normally `[system] + history + [user]`. When the estimate exceeds
    /// the threshold and more than one prior message exists, the full
    /// history is replaced with a single synthetic assistant summary
    /// message. Lossy: the stored rows are not rewritten.
    pub async fn assemble_context(
        &self,
        gateway: &dyn ModelGateway,
        system_prompt: &str,
        history: &[StoredMessage],
        user_message: &str,
        params: &GenerationParams,
        credential: Option<&str>,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt));
        for msg in history {
            messages.push(ChatMessage {
                role: msg.role,
                content: msg.content.clone(),
            });
        }
        messages.push(ChatMessage::user(user_message));

        if !self.needs_compaction(&messages, history.len()) {
            return messages;
        }

        let summary = self.summarize(gateway, history, params, credential).await;
        vec![
            ChatMessage::system(system_prompt),
            ChatMessage::assistant(format!("Summary of previous conversation: {}", summary)),
            ChatMessage::user(user_message),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_size_word_counts() {
        let messages = [
            ChatMessage::user("one two three four five"),
            ChatMessage::assistant("a b c d e f g"),
        ];
        assert_eq!(estimate_size(&messages), 12);
    }

    #[test]
    fn test_estimate_size_empty() {
        assert_eq!(estimate_size(&[]), 0);
        assert_eq!(estimate_size(&[ChatMessage::user("")]), 0);
    }

    #[test]
    fn test_compaction_requires_threshold_and_history() {
        let threshold = HistoryConfig::default().summary_threshold;
        let over = [ChatMessage::user("word ".repeat(1200))];
        let under = [ChatMessage::user("short")];

        // Single-message history never triggers, regardless of size.
        assert!(!compaction_needed(&over, 1, threshold));
        assert!(compaction_needed(&over, 2, threshold));
        assert!(!compaction_needed(&under, 5, threshold));
    }

    #[test]
    fn test_compaction_boundary_is_strictly_greater() {
        let messages = [ChatMessage::user("a ".repeat(1000).trim().to_string())];
        assert_eq!(estimate_size(&messages), 1000);
        assert!(!compaction_needed(&messages, 3, 1000));
    }
}
