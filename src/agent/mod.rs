//! Agent task loop: decomposition, execution, and completion checking
//!
//! A task is split into typed subtasks (text generation or shell
//! commands), each subtask is executed, and a completion check decides
//! whether to stop, plan more subtasks, or ask the user a question.

pub mod checker;
pub mod controller;
pub mod decomposer;
pub mod subtask;

pub use checker::{classify_reply, CheckError, CompletionChecker, Verdict};
pub use controller::{
    AgentController, AgentError, ApprovalPolicy, AutoExecutePolicy, ClarificationSource,
    CommandRuling, TaskOutcome, TaskReport,
};
pub use decomposer::Decomposer;
pub use subtask::{parse_subtask_lines, Subtask, SubtaskKind, SubtaskResult};
