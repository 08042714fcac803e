//! Agent Loop Controller
//!
//! Orchestrates decompose → execute → check, repeating until the task is
//! done, needs clarification the caller cannot supply, or fails. The
//! loop is bounded: at most `max_iterations` plan-execute-check rounds.

use super::checker::{CheckError, CompletionChecker, Verdict};
use super::decomposer::Decomposer;
use super::subtask::{Subtask, SubtaskKind, SubtaskResult};
use crate::executor::CommandExecutor;
use crate::gateway::{render_chat_error, ChatMessage, GatewayError, GenerationParams, ModelGateway};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SUBTASK_SYSTEM_PROMPT: &str =
    "You are now executing a subtask as part of a larger agent workflow.";

/// Per-command ruling supplied by the caller's policy layer. The core
/// never decides authorization itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRuling {
    /// Run the command; `approved` bypasses the whitelist when true.
    Execute { approved: bool },
    /// Don't run it; record the fixed skip message as the result.
    Skip,
}

/// Decides, per command subtask, whether execution is authorized.
pub trait ApprovalPolicy: Send + Sync {
    fn ruling(&self, command: &str) -> CommandRuling;
}

/// Blanket policy derived from an auto-execute flag: commands either run
/// under whitelist rules or are skipped wholesale.
pub struct AutoExecutePolicy {
    pub enabled: bool,
}

impl ApprovalPolicy for AutoExecutePolicy {
    fn ruling(&self, _command: &str) -> CommandRuling {
        if self.enabled {
            CommandRuling::Execute { approved: false }
        } else {
            CommandRuling::Skip
        }
    }
}

/// Optional supplier of a single answer to an AskUser question.
#[async_trait]
pub trait ClarificationSource: Send + Sync {
    async fn answer(&self, question: &str) -> Option<String>;
}

/// Terminal failures of a task run
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("task decomposition failed: {0}")]
    Decompose(GatewayError),

    #[error("decomposition produced no subtasks")]
    EmptyPlan,

    #[error("invalid response from completion check: {0}")]
    Protocol(String),

    #[error("completion check failed: {0}")]
    Check(GatewayError),

    #[error("no completion after {iterations} iterations")]
    Exhausted { iterations: u32 },

    #[error("model asked another question after the clarification round")]
    Unanswered,
}

/// Everything that happened during a run, for rendering the transcript.
#[derive(Debug, Clone, Default)]
pub struct TaskReport {
    pub results: Vec<SubtaskResult>,
    pub iterations: u32,
}

/// Terminal state of a task run
#[derive(Debug)]
pub enum TaskOutcome {
    Done(TaskReport),
    NeedsClarification { question: String, report: TaskReport },
    Failed { error: AgentError, report: TaskReport },
}

impl TaskOutcome {
    pub fn report(&self) -> &TaskReport {
        match self {
            TaskOutcome::Done(report) => report,
            TaskOutcome::NeedsClarification { report, .. } => report,
            TaskOutcome::Failed { report, .. } => report,
        }
    }

    /// Render the reply transcript shown to the user: the subtask list,
    /// per-subtask results, and the final state.
    pub fn render_transcript(&self) -> String {
        let report = self.report();

        let mut reply = String::from("Agent Task Decomposition and Execution Results:\n\n");
        reply.push_str("Subtasks:\n");
        for res in &report.results {
            reply.push_str(&format!("- {}\n", res.subtask));
        }
        reply.push('\n');
        for (idx, res) in report.results.iter().enumerate() {
            reply.push_str(&format!("Result for subtask {}:\n{}\n\n", idx + 1, res.result));
        }

        match self {
            TaskOutcome::Done(_) => reply.push_str("Task complete."),
            TaskOutcome::NeedsClarification { question, .. } => {
                reply.push_str(&format!("Clarification needed: {}", question));
            }
            TaskOutcome::Failed { error, .. } => {
                reply.push_str(&format!("Task failed: {}", error));
            }
        }

        reply
    }
}

/// The loop state machine: Decomposing → Executing → Checking, branching
/// to Done, a new plan, AwaitingAnswer, or Failed.
pub struct AgentController {
    gateway: Arc<dyn ModelGateway>,
    decomposer: Decomposer,
    checker: CompletionChecker,
    executor: Arc<CommandExecutor>,
    max_iterations: u32,
}

impl AgentController {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        executor: Arc<CommandExecutor>,
        max_iterations: u32,
    ) -> Self {
        Self {
            decomposer: Decomposer::new(Arc::clone(&gateway)),
            checker: CompletionChecker::new(Arc::clone(&gateway)),
            gateway,
            executor,
            max_iterations,
        }
    }

    /// Run one task to a terminal outcome.
    ///
    /// `policy` rules on each command subtask; `clarifier`, when present,
    /// supplies at most one answer per check phase (the single-round
    /// clarification semantics — a second question after an answer fails
    /// the run).
    pub async fn run(
        &self,
        task: &str,
        params: &GenerationParams,
        credential: Option<&str>,
        policy: &dyn ApprovalPolicy,
        clarifier: Option<&dyn ClarificationSource>,
    ) -> TaskOutcome {
        let mut report = TaskReport::default();

        info!(task, "starting agent task");

        let mut plan = match self.decomposer.decompose(task, params, credential).await {
            Ok(plan) => plan,
            Err(err) => {
                warn!(error = %err, "decomposition failed");
                return TaskOutcome::Failed {
                    error: AgentError::Decompose(err),
                    report,
                };
            }
        };

        if plan.is_empty() {
            return TaskOutcome::Failed {
                error: AgentError::EmptyPlan,
                report,
            };
        }

        for iteration in 1..=self.max_iterations {
            report.iterations = iteration;
            debug!(iteration, subtasks = plan.len(), "executing plan");

            // Executing: every subtask in order; results are scoped to
            // this iteration.
            let mut results = Vec::with_capacity(plan.len());
            for subtask in &plan {
                let result = self.execute_subtask(subtask, params, credential, policy).await;
                results.push(SubtaskResult {
                    subtask: subtask.content.clone(),
                    result,
                });
            }
            report.results.extend(results.iter().cloned());

            // Checking: at most one clarification round per check phase.
            let mut answer: Option<String> = None;
            loop {
                let verdict = self
                    .checker
                    .check(task, &results, params, credential, answer.as_deref())
                    .await;

                match verdict {
                    Ok(Verdict::Done) => {
                        info!(iteration, "agent task complete");
                        return TaskOutcome::Done(report);
                    }
                    Ok(Verdict::Continue(subtasks)) => {
                        if subtasks.is_empty() {
                            // MORE_SUBTASKS with nothing parseable would
                            // stall the loop; fail instead.
                            return TaskOutcome::Failed {
                                error: AgentError::Protocol(
                                    "MORE_SUBTASKS produced an empty subtask list".to_string(),
                                ),
                                report,
                            };
                        }
                        plan = subtasks;
                        break;
                    }
                    Ok(Verdict::AskUser(question)) => {
                        if answer.is_some() {
                            return TaskOutcome::Failed {
                                error: AgentError::Unanswered,
                                report,
                            };
                        }
                        let supplied = match clarifier {
                            Some(source) => source.answer(&question).await,
                            None => None,
                        };
                        match supplied {
                            Some(text) => {
                                debug!("clarification supplied, re-checking");
                                answer = Some(text);
                            }
                            None => {
                                return TaskOutcome::NeedsClarification { question, report };
                            }
                        }
                    }
                    Err(CheckError::Protocol(reply)) => {
                        warn!("completion check returned an unrecognized reply");
                        return TaskOutcome::Failed {
                            error: AgentError::Protocol(reply),
                            report,
                        };
                    }
                    Err(CheckError::Gateway(err)) => {
                        return TaskOutcome::Failed {
                            error: AgentError::Check(err),
                            report,
                        };
                    }
                }
            }
        }

        warn!(iterations = self.max_iterations, "agent loop exhausted");
        TaskOutcome::Failed {
            error: AgentError::Exhausted {
                iterations: self.max_iterations,
            },
            report,
        }
    }

    /// Dispatch one subtask: generative work goes to the gateway as a
    /// fresh single-turn conversation, commands through the policy layer
    /// to the executor. Always yields a result string; per-subtask
    /// failures don't stop the iteration.
    async fn execute_subtask(
        &self,
        subtask: &Subtask,
        params: &GenerationParams,
        credential: Option<&str>,
        policy: &dyn ApprovalPolicy,
    ) -> String {
        match subtask.kind {
            SubtaskKind::Generative => {
                let messages = [
                    ChatMessage::system(SUBTASK_SYSTEM_PROMPT),
                    ChatMessage::user(&subtask.content),
                ];
                match self.gateway.complete(&messages, params, credential).await {
                    Ok(text) => text,
                    Err(err) => render_chat_error(&err),
                }
            }
            SubtaskKind::Command => match policy.ruling(&subtask.content) {
                CommandRuling::Execute { approved } => {
                    match self.executor.run(&subtask.content, approved).await {
                        Ok(output) => output,
                        Err(err) => err.to_string(),
                    }
                }
                CommandRuling::Skip => format!(
                    "Auto-execution disabled. Command '{}' not run.",
                    subtask.content
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_execute_policy() {
        let on = AutoExecutePolicy { enabled: true };
        assert_eq!(on.ruling("ls"), CommandRuling::Execute { approved: false });

        let off = AutoExecutePolicy { enabled: false };
        assert_eq!(off.ruling("ls"), CommandRuling::Skip);
    }

    #[test]
    fn test_transcript_rendering() {
        let outcome = TaskOutcome::Done(TaskReport {
            results: vec![
                SubtaskResult {
                    subtask: "ls".to_string(),
                    result: "file.txt".to_string(),
                },
                SubtaskResult {
                    subtask: "count the lines above".to_string(),
                    result: "1".to_string(),
                },
            ],
            iterations: 1,
        });

        let transcript = outcome.render_transcript();
        assert!(transcript.starts_with("Agent Task Decomposition and Execution Results:"));
        assert!(transcript.contains("- ls\n"));
        assert!(transcript.contains("Result for subtask 1:\nfile.txt"));
        assert!(transcript.contains("Result for subtask 2:\n1"));
        assert!(transcript.ends_with("Task complete."));
    }

    #[test]
    fn test_transcript_surfaces_question() {
        let outcome = TaskOutcome::NeedsClarification {
            question: "which file?".to_string(),
            report: TaskReport::default(),
        };
        assert!(outcome
            .render_transcript()
            .ends_with("Clarification needed: which file?"));
    }

    #[test]
    fn test_transcript_surfaces_failure() {
        let outcome = TaskOutcome::Failed {
            error: AgentError::EmptyPlan,
            report: TaskReport::default(),
        };
        assert!(outcome
            .render_transcript()
            .contains("Task failed: decomposition produced no subtasks"));
    }
}
