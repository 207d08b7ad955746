//! Breaking an approved task into subtasks.

use std::sync::Arc;

use async_trait::async_trait;
use devopsbot_core::{parse_payload, to_payload, BotError, NewSubtask, SubtaskDraft};
use devopsbot_flow::Step;
use devopsbot_model::client::ModelClient;
use devopsbot_model::structured::{complete, Schema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jira::IssueTracker;
use crate::prompt::{build_split_prompt, split_params};
use crate::TaskRef;

/// Subtasks proposed by the model; may be empty.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubtaskPlan {
    /// Proposed subtasks in creation order.
    pub subtasks: Vec<SubtaskDraft>,
}

impl Schema for SubtaskPlan {
    fn validate(&self) -> Result<(), String> {
        match self.subtasks.iter().position(|s| s.title.trim().is_empty()) {
            Some(i) => Err(format!("subtask {i} has an empty title")),
            None => Ok(()),
        }
    }
}

/// Result of the split step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SplitOutcome {
    /// Always true once the step returns; individual creation failures are
    /// counted in `failed` instead.
    pub success: bool,
    /// Keys of the subtasks that were created.
    pub created: Vec<String>,
    /// Number of subtasks that could not be created.
    pub failed: usize,
}

/// Creates the subtasks the model proposes for a task.
pub struct SubtaskSplit {
    tracker: Arc<dyn IssueTracker>,
    model: Arc<dyn ModelClient>,
}

impl SubtaskSplit {
    /// Create the step.
    pub fn new(tracker: Arc<dyn IssueTracker>, model: Arc<dyn ModelClient>) -> Self {
        Self { tracker, model }
    }

    /// Split `task_key`.
    ///
    /// Bugs and subtasks are returned untouched. Each subtask is created
    /// independently; a failure is logged and the rest are still attempted.
    ///
    /// # Errors
    ///
    /// Fetching the issue or calling the model can fail the step; subtask
    /// creation cannot.
    pub async fn split(&self, task_key: &str) -> Result<SplitOutcome, BotError> {
        let issue = self.tracker.get_issue(task_key).await?;

        if !issue.is_splittable() {
            tracing::info!(issue = %issue.key, issue_type = %issue.issue_type, "not splitting");
            return Ok(SplitOutcome {
                success: true,
                ..SplitOutcome::default()
            });
        }

        let prompt = build_split_prompt(issue.description_text());
        let plan: SubtaskPlan = complete(self.model.as_ref(), &prompt, split_params()).await?;
        tracing::info!(issue = %issue.key, proposed = plan.subtasks.len(), "subtasks proposed");

        let mut outcome = SplitOutcome {
            success: true,
            ..SplitOutcome::default()
        };
        for draft in plan.subtasks {
            let subtask = NewSubtask::from_draft(&issue.key, draft);
            match self.tracker.create_subtask(&subtask).await {
                Ok(key) => {
                    tracing::info!(parent = %issue.key, subtask = %key, "subtask created");
                    outcome.created.push(key);
                }
                Err(e) => {
                    tracing::warn!(
                        parent = %issue.key,
                        summary = %subtask.summary,
                        error = %e,
                        "failed to create subtask"
                    );
                    outcome.failed += 1;
                }
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl Step for SubtaskSplit {
    async fn run(&self, input: Value) -> Result<Value, BotError> {
        let task: TaskRef = parse_payload(input)?;
        let outcome = self.split(&task.task_key).await?;
        to_payload(&outcome)
    }
}

#[cfg(test)]
mod tests {
    use devopsbot_model::scripted::ScriptedModel;
    use serde_json::json;

    use super::*;
    use crate::fake::FakeTracker;

    const PLAN: &str = r#"{"subtasks":[{"title":"Add route","description":"GET /health"},{"title":"Add probe","description":"k8s liveness"}]}"#;

    #[tokio::test]
    async fn bug_is_never_split() {
        let tracker = Arc::new(FakeTracker::with_issue("OPS-2", "Bug", None));
        let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));

        let out = SubtaskSplit::new(tracker.clone(), model.clone())
            .run(json!({"taskKey": "OPS-2"}))
            .await
            .unwrap();

        assert_eq!(out["success"], true);
        assert_eq!(model.call_count(), 0);
        assert!(tracker.created().is_empty());
    }

    #[tokio::test]
    async fn subtask_is_never_split() {
        let tracker = Arc::new(FakeTracker::with_issue("OPS-2", "Subtask", None));
        let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
        let outcome = SubtaskSplit::new(tracker, model.clone()).split("OPS-2").await.unwrap();
        assert!(outcome.success);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn creates_each_proposed_subtask_under_parent() {
        let tracker = Arc::new(FakeTracker::with_issue("OPS-2", "Story", None));
        let model = Arc::new(ScriptedModel::new([PLAN]));

        let outcome = SubtaskSplit::new(tracker.clone(), model.clone())
            .split("OPS-2")
            .await
            .unwrap();

        assert_eq!(outcome.created, vec!["OPS-100", "OPS-101"]);
        assert_eq!(outcome.failed, 0);
        assert_eq!(model.params()[0].max_tokens, 2048);
        let created = tracker.created();
        assert_eq!(created[0].parent_key, "OPS-2");
        assert_eq!(created[0].project_key, "OPS");
        assert_eq!(created[1].summary, "Add probe");
    }

    #[tokio::test]
    async fn creation_failure_is_skipped() {
        let tracker = Arc::new(
            FakeTracker::with_issue("OPS-2", "Task", None).failing_summary("Add route"),
        );
        let model = Arc::new(ScriptedModel::new([PLAN]));

        let outcome = SubtaskSplit::new(tracker, model).split("OPS-2").await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.created, vec!["OPS-100"]);
        assert_eq!(outcome.failed, 1);
    }

    #[tokio::test]
    async fn empty_plan_creates_nothing() {
        let tracker = Arc::new(FakeTracker::with_issue("OPS-2", "Task", None));
        let model = Arc::new(ScriptedModel::new([r#"{"subtasks":[]}"#]));
        let outcome = SubtaskSplit::new(tracker.clone(), model).split("OPS-2").await.unwrap();
        assert!(outcome.created.is_empty());
        assert!(tracker.created().is_empty());
    }

    #[tokio::test]
    async fn untitled_subtask_is_malformed() {
        let tracker = Arc::new(FakeTracker::with_issue("OPS-2", "Task", None));
        let model = Arc::new(ScriptedModel::new([
            r#"{"subtasks":[{"title":" ","description":"x"}]}"#,
        ]));
        let err = SubtaskSplit::new(tracker, model).split("OPS-2").await.unwrap_err();
        assert!(matches!(err, BotError::MalformedCompletion { .. }));
    }
}
