//! Jira kanban automation: review new tasks for clarity and split approved
//! ones into subtasks.
//!
//! The steps are independent units wired together by [`flow::kanban_flow`]:
//! - [`trigger::KanbanTrigger`] starts a workflow from a pub/sub notification
//! - [`review::TaskReview`] asks the model whether a task is clear enough and
//!   bounces it back to the reporter if not
//! - [`split::SubtaskSplit`] creates the subtasks the model proposes

pub mod flow;
pub mod jira;
pub mod prompt;
pub mod review;
pub mod split;
pub mod trigger;

#[cfg(test)]
mod fake;

use serde::{Deserialize, Serialize};

/// Input of the review and split steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    /// Issue key, e.g. `OPS-12`.
    pub task_key: String,
}
