//! Starting report generation for an alarm.

use std::sync::Arc;

use async_trait::async_trait;
use devopsbot_core::{format_transition_time, to_payload, BotError};
use devopsbot_flow::{Step, WorkflowStarter};
use serde_json::Value;

use crate::alarms::{scan_transitions, AlarmHistory};
use crate::StatusResponse;

/// Looks up an alarm's last transitions and starts the report workflow.
pub struct IncidentTrigger {
    alarms: Arc<dyn AlarmHistory>,
    starter: Arc<dyn WorkflowStarter>,
}

impl IncidentTrigger {
    /// Create the trigger.
    pub fn new(alarms: Arc<dyn AlarmHistory>, starter: Arc<dyn WorkflowStarter>) -> Self {
        Self { alarms, starter }
    }

    /// Handle an alarm event carrying `metricAlarmName`.
    ///
    /// The event is passed to the workflow unchanged apart from the added
    /// `lastAlarmTime` and `lastOkTime`. If the history lacks either
    /// transition, a 400 result is returned and nothing is started.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::InvalidPayload`] if the event is not an object
    /// with a string `metricAlarmName`; history and start failures propagate.
    pub async fn handle(&self, mut event: Value) -> Result<StatusResponse, BotError> {
        let alarm_name = event
            .get("metricAlarmName")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BotError::InvalidPayload("event has no metricAlarmName".into()))?;

        let history = self.alarms.state_updates(&alarm_name).await?;
        let Some((last_alarm, last_ok)) = scan_transitions(&history).both() else {
            tracing::warn!(alarm = %alarm_name, "unable to determine state transitions");
            return Ok(StatusResponse::new(400, "Report generation failed"));
        };

        let fields = event
            .as_object_mut()
            .ok_or_else(|| BotError::InvalidPayload("event is not an object".into()))?;
        fields.insert(
            "lastAlarmTime".into(),
            Value::String(format_transition_time(last_alarm)),
        );
        fields.insert(
            "lastOkTime".into(),
            Value::String(format_transition_time(last_ok)),
        );

        let execution = self.starter.start(event).await?;
        tracing::info!(alarm = %alarm_name, execution = %execution, "report workflow started");
        Ok(StatusResponse::new(200, "Report Generating"))
    }
}

#[async_trait]
impl Step for IncidentTrigger {
    async fn run(&self, input: Value) -> Result<Value, BotError> {
        let response = self.handle(input).await?;
        to_payload(&response)
    }
}

#[cfg(test)]
mod tests {
    use devopsbot_flow::RecordingStarter;
    use serde_json::json;

    use super::*;
    use crate::alarms::tests::transition;
    use crate::alarms::HistoryItem;

    struct FixedHistory(Vec<HistoryItem>);

    #[async_trait]
    impl AlarmHistory for FixedHistory {
        async fn state_updates(&self, _alarm_name: &str) -> Result<Vec<HistoryItem>, BotError> {
            Ok(self.0.clone())
        }
    }

    fn trigger(items: Vec<HistoryItem>, starter: Arc<RecordingStarter>) -> IncidentTrigger {
        IncidentTrigger::new(Arc::new(FixedHistory(items)), starter)
    }

    #[tokio::test]
    async fn starts_workflow_with_window_and_passthrough() {
        let starter = Arc::new(RecordingStarter::new());
        let items = vec![
            transition(50, "ALARM"),
            transition(40, "ALARM"),
            transition(30, "OK"),
            transition(20, "OK"),
        ];

        let response = trigger(items, starter.clone())
            .handle(json!({"metricAlarmName": "HighCPU", "namespace": "AWS/EC2"}))
            .await
            .unwrap();

        assert_eq!(response, StatusResponse::new(200, "Report Generating"));
        assert_eq!(
            starter.started(),
            vec![json!({
                "metricAlarmName": "HighCPU",
                "namespace": "AWS/EC2",
                "lastAlarmTime": "2024-05-01T12:50:00.000000Z",
                "lastOkTime": "2024-05-01T12:30:00.000000Z"
            })]
        );
    }

    #[tokio::test]
    async fn missing_ok_transition_starts_nothing() {
        let starter = Arc::new(RecordingStarter::new());
        let response = trigger(vec![transition(50, "ALARM")], starter.clone())
            .handle(json!({"metricAlarmName": "HighCPU"}))
            .await
            .unwrap();

        assert_eq!(response, StatusResponse::new(400, "Report generation failed"));
        assert!(starter.started().is_empty());
    }

    #[tokio::test]
    async fn missing_alarm_transition_starts_nothing() {
        let starter = Arc::new(RecordingStarter::new());
        let response = trigger(vec![transition(20, "OK")], starter.clone())
            .handle(json!({"metricAlarmName": "HighCPU"}))
            .await
            .unwrap();

        assert_eq!(response.status_code, 400);
        assert!(starter.started().is_empty());
    }

    #[tokio::test]
    async fn missing_alarm_name_is_invalid_payload() {
        let starter = Arc::new(RecordingStarter::new());
        let err = trigger(Vec::new(), starter)
            .handle(json!({"alarm": "HighCPU"}))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::InvalidPayload(_)));
    }
}
