use std::sync::Arc;

use devopsbot_flow::{Flow, StepRegistry};

use crate::review::TaskReview;
use crate::split::SubtaskSplit;

/// Registered name of the review step.
pub const REVIEW_STEP: &str = "jira-task-review";

/// Registered name of the split step.
pub const SPLIT_STEP: &str = "jira-subtask-split";

/// Review a task, then split it only if it passed.
///
/// # Examples
///
/// ```
/// use devopsbot_kanban::flow::{kanban_flow, REVIEW_STEP, SPLIT_STEP};
///
/// let flow = kanban_flow();
/// let names = flow.step_names();
/// assert!(names.contains(REVIEW_STEP));
/// assert!(names.contains(SPLIT_STEP));
/// ```
pub fn kanban_flow() -> Flow {
    Flow::chain(vec![
        Flow::task(REVIEW_STEP),
        Flow::choice("$.proceed", true, Flow::task(SPLIT_STEP), Flow::Succeed),
    ])
}

/// Register the kanban steps under the names [`kanban_flow`] uses.
pub fn register(registry: &mut StepRegistry, review: TaskReview, split: SubtaskSplit) {
    registry
        .register(REVIEW_STEP, Arc::new(review))
        .register(SPLIT_STEP, Arc::new(split));
}

#[cfg(test)]
mod tests {
    use devopsbot_flow::Engine;
    use devopsbot_model::scripted::ScriptedModel;
    use serde_json::json;

    use super::*;
    use crate::fake::FakeTracker;

    fn engine(tracker: Arc<FakeTracker>, model: Arc<ScriptedModel>) -> Engine {
        let mut registry = StepRegistry::new();
        register(
            &mut registry,
            TaskReview::new(tracker.clone(), model.clone(), "bot@example.com"),
            SubtaskSplit::new(tracker, model),
        );
        Engine::new(registry)
    }

    #[tokio::test]
    async fn passing_review_flows_into_split() {
        let tracker = Arc::new(FakeTracker::with_issue("OPS-3", "Story", Some("dev@example.com")));
        let model = Arc::new(ScriptedModel::new([
            r#"{"pass": true}"#,
            r#"{"subtasks":[{"title":"Add route","description":"GET /health"}]}"#,
        ]));

        let out = engine(tracker.clone(), model.clone())
            .execute(&kanban_flow(), json!({"taskKey": "OPS-3"}))
            .await
            .unwrap();

        assert_eq!(out["success"], true);
        assert_eq!(out["created"], json!(["OPS-100"]));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn failing_review_ends_the_flow() {
        let tracker = Arc::new(FakeTracker::with_issue("OPS-3", "Story", Some("dev@example.com")));
        let model = Arc::new(ScriptedModel::new([
            r#"{"pass": false, "comment": "Which endpoint?"}"#,
        ]));

        let out = engine(tracker.clone(), model.clone())
            .execute(&kanban_flow(), json!({"taskKey": "OPS-3"}))
            .await
            .unwrap();

        assert_eq!(out, json!({"proceed": false, "taskKey": "OPS-3"}));
        assert_eq!(model.call_count(), 1);
        assert!(tracker.created().is_empty());
    }
}
