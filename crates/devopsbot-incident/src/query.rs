//! Playbook lookup over previous incidents.

use std::sync::Arc;

use async_trait::async_trait;
use devopsbot_core::{parse_payload, to_payload, BotError};
use devopsbot_flow::Step;
use devopsbot_model::knowledge::KnowledgeBase;
use serde::Deserialize;
use serde_json::Value;

use crate::StatusResponse;

/// Header prepended to every answer.
pub const GUIDANCE_BANNER: &str = "*Guidance provided by DevOpsBot*";

/// The alarm a playbook is requested for.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybookRequest {
    /// Alarm name.
    pub metric_alarm_name: String,
    /// Metric namespace, e.g. `AWS/EC2`.
    pub namespace: String,
    /// Metric name, e.g. `CPUUtilization`.
    pub metric: String,
}

/// Build the playbook prompt.
///
/// # Examples
///
/// ```
/// use devopsbot_incident::query::{build_playbook_prompt, PlaybookRequest};
///
/// let prompt = build_playbook_prompt(&PlaybookRequest {
///     metric_alarm_name: "HighCPU".into(),
///     namespace: "AWS/EC2".into(),
///     metric: "CPUUtilization".into(),
/// });
/// assert!(prompt.contains("previous incidents of HighCPU"));
/// assert!(prompt.contains("AWS/EC2 namespace, for CPUUtilization metric"));
/// ```
pub fn build_playbook_prompt(request: &PlaybookRequest) -> String {
    format!(
        "Create a playbook based on previous incidents of {} helping the resolver to identify and resolve the issue.\n\
         The CloudWatch alarm is for {} namespace, for {} metric.\n\
         Use other knowledge of this alarm type to further influence the output where there might be gaps.\n\
         Format in markdown only\n",
        request.metric_alarm_name, request.namespace, request.metric
    )
}

/// Answers "how was this alarm resolved before" from the report knowledge base.
pub struct PreviousIncidents {
    knowledge_base: Arc<dyn KnowledgeBase>,
}

impl PreviousIncidents {
    /// Create the step.
    pub fn new(knowledge_base: Arc<dyn KnowledgeBase>) -> Self {
        Self { knowledge_base }
    }

    /// Generate a playbook for `request`.
    ///
    /// # Errors
    ///
    /// Knowledge base failures propagate.
    pub async fn playbook(&self, request: &PlaybookRequest) -> Result<StatusResponse, BotError> {
        let answer = self
            .knowledge_base
            .retrieve_and_generate(&build_playbook_prompt(request))
            .await?;
        tracing::info!(alarm = %request.metric_alarm_name, "playbook generated");
        Ok(StatusResponse::new(200, format!("{GUIDANCE_BANNER}\n```{answer}```")))
    }
}

#[async_trait]
impl Step for PreviousIncidents {
    async fn run(&self, input: Value) -> Result<Value, BotError> {
        let request: PlaybookRequest = parse_payload(input)?;
        let response = self.playbook(&request).await?;
        to_payload(&response)
    }
}
