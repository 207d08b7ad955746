use std::sync::Arc;

use devopsbot_codereview::handler::CodeReview;
use devopsbot_core::BotError;
use devopsbot_flow::Step;

use crate::services::Services;

/// Shared application state passed to all route handlers.
///
/// Each automation is optional; a route whose automation is absent answers
/// 503 so that one missing setting does not take the whole server down.
#[derive(Clone, Default)]
pub struct AppState {
    /// Pull request webhook handler behind `POST /review`.
    pub review: Option<Arc<CodeReview>>,
    /// Kanban trigger behind `POST /kanban/events`.
    pub kanban: Option<Arc<dyn Step>>,
    /// Incident trigger behind `POST /incident/alarms`.
    pub alarms: Option<Arc<dyn Step>>,
    /// Ingestion step behind `POST /incident/reports/notify`.
    pub ingest: Option<Arc<dyn Step>>,
    /// Playbook step behind `POST /incident/query`.
    pub query: Option<Arc<dyn Step>>,
}

impl AppState {
    /// State with no automations wired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire the pull request review handler.
    pub fn with_review(mut self, review: CodeReview) -> Self {
        self.review = Some(Arc::new(review));
        self
    }

    /// Wire the kanban trigger.
    pub fn with_kanban(mut self, trigger: Arc<dyn Step>) -> Self {
        self.kanban = Some(trigger);
        self
    }

    /// Wire the incident trigger.
    pub fn with_alarms(mut self, trigger: Arc<dyn Step>) -> Self {
        self.alarms = Some(trigger);
        self
    }

    /// Wire the ingestion step.
    pub fn with_ingest(mut self, step: Arc<dyn Step>) -> Self {
        self.ingest = Some(step);
        self
    }

    /// Wire the playbook step.
    pub fn with_query(mut self, step: Arc<dyn Step>) -> Self {
        self.query = Some(step);
        self
    }

    /// Wire every automation `services` can build.
    pub async fn from_services(services: &Services) -> Self {
        let mut state = Self::new();
        if let Some(review) = available("review", services.code_review().await) {
            state = state.with_review(review);
        }
        if let Some(trigger) = available("kanban", services.kanban_trigger().await) {
            state = state.with_kanban(Arc::new(trigger));
        }
        if let Some(trigger) = available("alarms", services.incident_trigger().await) {
            state = state.with_alarms(Arc::new(trigger));
        }
        if let Some(step) = available("ingest", services.start_ingestion().await) {
            state = state.with_ingest(Arc::new(step));
        }
        if let Some(step) = available("query", services.previous_incidents().await) {
            state = state.with_query(Arc::new(step));
        }
        state
    }
}

fn available<T>(automation: &str, built: Result<T, BotError>) -> Option<T> {
    match built {
        Ok(handle) => {
            tracing::info!(automation, "automation enabled");
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(automation, error = %e, "automation disabled");
            None
        }
    }
}
