//! Starting the kanban workflow from a pub/sub notification.

use std::sync::Arc;

use async_trait::async_trait;
use devopsbot_core::{parse_payload, to_payload, BotError};
use devopsbot_flow::{Step, WorkflowStarter};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "Records", default)]
    records: Vec<EnvelopeRecord>,
}

#[derive(Deserialize)]
struct EnvelopeRecord {
    #[serde(rename = "Sns")]
    sns: Notification,
}

#[derive(Deserialize)]
struct Notification {
    #[serde(rename = "Message")]
    message: String,
}

/// Response returned to the notification source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    /// HTTP-style status code.
    pub status_code: u16,
    /// Response body.
    pub body: Value,
}

/// Extract the workflow input carried by the first record of `envelope`.
///
/// # Errors
///
/// Returns [`BotError::InvalidPayload`] when the envelope has no records,
/// the message is not JSON, or it carries no `automationData`.
///
/// # Examples
///
/// ```
/// use devopsbot_kanban::trigger::automation_data;
/// use serde_json::json;
///
/// let envelope = json!({"Records": [{"Sns": {"Message": "{\"automationData\": {\"taskKey\": \"OPS-5\"}}"}}]});
/// assert_eq!(automation_data(envelope).unwrap(), json!({"taskKey": "OPS-5"}));
/// ```
pub fn automation_data(envelope: Value) -> Result<Value, BotError> {
    let envelope: Envelope = parse_payload(envelope)?;
    let record = envelope
        .records
        .into_iter()
        .next()
        .ok_or_else(|| BotError::InvalidPayload("notification has no records".into()))?;
    let mut message: Value = serde_json::from_str(&record.sns.message)
        .map_err(|e| BotError::InvalidPayload(format!("notification message is not JSON: {e}")))?;
    message
        .get_mut("automationData")
        .map(Value::take)
        .filter(|data| !data.is_null())
        .ok_or_else(|| BotError::InvalidPayload("message has no automationData".into()))
}

/// Starts one kanban workflow execution per notification.
pub struct KanbanTrigger {
    starter: Arc<dyn WorkflowStarter>,
}

impl KanbanTrigger {
    /// Create the trigger.
    pub fn new(starter: Arc<dyn WorkflowStarter>) -> Self {
        Self { starter }
    }

    /// Handle a notification envelope.
    ///
    /// # Errors
    ///
    /// Shape faults are [`BotError::InvalidPayload`]; a failure to start the
    /// workflow propagates.
    pub async fn handle(&self, envelope: Value) -> Result<TriggerResponse, BotError> {
        let input = automation_data(envelope)?;
        let execution = self.starter.start(input).await?;
        tracing::info!(execution = %execution, "kanban workflow started");
        Ok(TriggerResponse {
            status_code: 200,
            body: json!({ "message": "Successfully started workflow" }),
        })
    }
}

#[async_trait]
impl Step for KanbanTrigger {
    async fn run(&self, input: Value) -> Result<Value, BotError> {
        let response = self.handle(input).await?;
        to_payload(&response)
    }
}
