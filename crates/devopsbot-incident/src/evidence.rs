//! Evidence-gathering steps run in parallel by the incident workflow.

use std::sync::Arc;

use async_trait::async_trait;
use devopsbot_core::{parse_payload, parse_timestamp, BotError, TimeWindow};
use devopsbot_flow::Step;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::cloudtrail::AuditTrail;
use crate::slack::ChatHistory;

/// Key under which audit events are returned.
pub const CLOUDTRAIL_KEY: &str = "cloudtrail_events";

/// Key under which chat messages are returned.
pub const SLACK_KEY: &str = "slack_events";

/// The alarm transition timestamps every evidence step reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInput {
    /// When the alarm last entered `ALARM`.
    pub last_alarm_time: String,
    /// When the alarm last entered `OK`.
    pub last_ok_time: String,
}

impl WindowInput {
    /// The range between both transitions, whichever came first.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Time`] if either timestamp cannot be parsed.
    pub fn query_window(&self) -> Result<TimeWindow, BotError> {
        Ok(TimeWindow::spanning(
            parse_timestamp(&self.last_alarm_time)?,
            parse_timestamp(&self.last_ok_time)?,
        ))
    }
}

/// Looks up audit events inside the alarm window.
pub struct CloudTrailLookup {
    trail: Arc<dyn AuditTrail>,
}

impl CloudTrailLookup {
    /// Create the step.
    pub fn new(trail: Arc<dyn AuditTrail>) -> Self {
        Self { trail }
    }
}

#[async_trait]
impl Step for CloudTrailLookup {
    async fn run(&self, input: Value) -> Result<Value, BotError> {
        let window = parse_payload::<WindowInput>(input)?.query_window()?;
        let events = self.trail.lookup(window).await?;
        tracing::info!(count = events.len(), "collected audit events");
        Ok(json!({ CLOUDTRAIL_KEY: serde_json::to_string(&events)? }))
    }
}

/// Reads chat messages posted inside the alarm window.
pub struct SlackLookup {
    chat: Arc<dyn ChatHistory>,
}

impl SlackLookup {
    /// Create the step.
    pub fn new(chat: Arc<dyn ChatHistory>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl Step for SlackLookup {
    async fn run(&self, input: Value) -> Result<Value, BotError> {
        let window = parse_payload::<WindowInput>(input)?.query_window()?;
        let messages = self.chat.messages(window).await?;
        tracing::info!(count = messages.len(), "collected chat messages");
        Ok(json!({ SLACK_KEY: serde_json::to_string(&messages)? }))
    }
}
