//! Quality review of a task description.

use std::sync::Arc;

use async_trait::async_trait;
use devopsbot_core::{parse_payload, to_payload, BotError};
use devopsbot_flow::Step;
use devopsbot_model::client::ModelClient;
use devopsbot_model::structured::{complete, Schema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jira::IssueTracker;
use crate::prompt::{build_review_prompt, review_params};
use crate::TaskRef;

/// The model's judgement of a task description.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewVerdict {
    /// Whether the task meets the quality bar.
    pub pass: bool,
    /// Guidance for the reporter; required when `pass` is false.
    #[serde(default)]
    pub comment: Option<String>,
}

impl Schema for ReviewVerdict {
    fn validate(&self) -> Result<(), String> {
        let has_comment = self
            .comment
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if !self.pass && !has_comment {
            return Err("failing verdict has no comment".into());
        }
        Ok(())
    }
}

/// Result of the review step; `proceed` drives the split branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    /// Whether the workflow should continue to the split step.
    pub proceed: bool,
    /// The reviewed task.
    pub task_key: String,
}

/// Reviews a task and bounces it back to the reporter when it is unclear.
pub struct TaskReview {
    tracker: Arc<dyn IssueTracker>,
    model: Arc<dyn ModelClient>,
    automation_username: String,
}

impl TaskReview {
    /// Create the step. Issues reported by `automation_username` skip review.
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        model: Arc<dyn ModelClient>,
        automation_username: impl Into<String>,
    ) -> Self {
        Self {
            tracker,
            model,
            automation_username: automation_username.into(),
        }
    }

    /// Review `task_key`.
    ///
    /// A failing verdict comments on the issue and reassigns it to its
    /// reporter before returning `proceed: false`.
    ///
    /// # Errors
    ///
    /// Tracker and model failures propagate; an unusable model reply is
    /// [`BotError::MalformedCompletion`].
    pub async fn review(&self, task_key: &str) -> Result<ReviewOutcome, BotError> {
        let issue = self.tracker.get_issue(task_key).await?;

        if issue.reporter.is_automation(&self.automation_username) {
            tracing::info!(issue = %issue.key, "raised by the automation account, skipping review");
            return Ok(ReviewOutcome {
                proceed: true,
                task_key: task_key.to_string(),
            });
        }

        let prompt = build_review_prompt(issue.description_text());
        let verdict: ReviewVerdict = complete(self.model.as_ref(), &prompt, review_params()).await?;

        if !verdict.pass {
            let comment = verdict.comment.as_deref().unwrap_or_default();
            tracing::info!(issue = %issue.key, comment, "task does not meet the quality bar");
            self.tracker.add_comment(&issue.key, comment).await?;
            self.tracker
                .assign(&issue.key, &issue.reporter.account_id)
                .await?;
        } else {
            tracing::info!(issue = %issue.key, "task passed review");
        }

        Ok(ReviewOutcome {
            proceed: verdict.pass,
            task_key: task_key.to_string(),
        })
    }
}

#[async_trait]
impl Step for TaskReview {
    async fn run(&self, input: Value) -> Result<Value, BotError> {
        let task: TaskRef = parse_payload(input)?;
        let outcome = self.review(&task.task_key).await?;
        to_payload(&outcome)
    }
}
