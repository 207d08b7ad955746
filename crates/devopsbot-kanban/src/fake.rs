use std::sync::Mutex;

use async_trait::async_trait;
use devopsbot_core::{BotError, Issue, NewSubtask, Reporter};

use crate::jira::IssueTracker;

/// In-memory tracker holding a single issue.
pub(crate) struct FakeTracker {
    issue: Issue,
    failing_summaries: Vec<String>,
    comments: Mutex<Vec<(String, String)>>,
    assignments: Mutex<Vec<(String, String)>>,
    created: Mutex<Vec<NewSubtask>>,
}

impl FakeTracker {
    pub(crate) fn with_issue(key: &str, issue_type: &str, email: Option<&str>) -> Self {
        Self {
            issue: Issue {
                key: key.into(),
                description: Some("Add a health endpoint".into()),
                reporter: Reporter {
                    account_id: "acc-reporter".into(),
                    email_address: email.map(str::to_string),
                },
                issue_type: issue_type.into(),
            },
            failing_summaries: Vec::new(),
            comments: Mutex::default(),
            assignments: Mutex::default(),
            created: Mutex::default(),
        }
    }

    pub(crate) fn failing_summary(mut self, summary: &str) -> Self {
        self.failing_summaries.push(summary.into());
        self
    }

    pub(crate) fn comments(&self) -> Vec<(String, String)> {
        self.comments.lock().unwrap().clone()
    }

    pub(crate) fn assignments(&self) -> Vec<(String, String)> {
        self.assignments.lock().unwrap().clone()
    }

    pub(crate) fn created(&self) -> Vec<NewSubtask> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn get_issue(&self, key: &str) -> Result<Issue, BotError> {
        if key == self.issue.key {
            Ok(self.issue.clone())
        } else {
            Err(BotError::Tracker(format!("no issue {key}")))
        }
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<(), BotError> {
        self.comments.lock().unwrap().push((key.into(), body.into()));
        Ok(())
    }

    async fn assign(&self, key: &str, account_id: &str) -> Result<(), BotError> {
        self.assignments
            .lock()
            .unwrap()
            .push((key.into(), account_id.into()));
        Ok(())
    }

    async fn create_subtask(&self, subtask: &NewSubtask) -> Result<String, BotError> {
        if self.failing_summaries.contains(&subtask.summary) {
            return Err(BotError::Tracker("field 'summary' rejected".into()));
        }
        let mut created = self.created.lock().unwrap();
        created.push(subtask.clone());
        Ok(format!("OPS-{}", 99 + created.len()))
    }
}
