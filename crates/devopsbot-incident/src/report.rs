//! Composing the incident report from gathered evidence.

use std::sync::Arc;

use async_trait::async_trait;
use devopsbot_core::{iso_format, parse_payload, parse_timestamp, BotError};
use devopsbot_flow::Step;
use devopsbot_model::client::{InferenceParams, ModelClient};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::evidence::{CLOUDTRAIL_KEY, SLACK_KEY};

/// Token budget for the report.
pub const REPORT_MAX_TOKENS: u32 = 4096;

const REPORT_BRIEF: &str = "\
You are an incident manager responsible for writing up an incident report after it has happened.
The following sections should be in the incident report.
1. Incident Summary
2. Timeline of Events
3. Root Cause Analysis
4. Impact Assessment
5. Resolution and Recovery
6. Lessons Learned
7. Action Items and Recommendations
You must use only the following information provided to fill out and omit any headings where you do not have \
enough detail. Focus on actions that are directly related to this.";

/// Evidence merged from the parallel lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evidence {
    /// Serialized audit events, empty if none were gathered.
    pub cloudtrail_events: String,
    /// Serialized chat messages, empty if none were gathered.
    pub slack_messages: String,
}

/// Merge parallel lookup results into one [`Evidence`].
///
/// Results are matched by the key they carry, so their order does not
/// matter. A result may be bare or wrapped in a `Payload` object, as a
/// managed engine returns function output.
///
/// # Examples
///
/// ```
/// use devopsbot_incident::report::collect_evidence;
/// use serde_json::json;
///
/// let evidence = collect_evidence(&[
///     json!({"Payload": {"slack_events": "[]"}}),
///     json!({"cloudtrail_events": "[{}]"}),
/// ]);
/// assert_eq!(evidence.cloudtrail_events, "[{}]");
/// assert_eq!(evidence.slack_messages, "[]");
/// ```
pub fn collect_evidence(results: &[Value]) -> Evidence {
    let mut evidence = Evidence::default();
    for result in results {
        let payload = result.get("Payload").unwrap_or(result);
        if let Some(events) = payload.get(CLOUDTRAIL_KEY) {
            evidence.cloudtrail_events = as_text(events);
        }
        if let Some(messages) = payload.get(SLACK_KEY) {
            evidence.slack_messages = as_text(messages);
        }
    }
    evidence
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the incident report prompt.
pub fn build_report_prompt(from: &str, to: &str, alarm_name: &str, evidence: &Evidence) -> String {
    format!(
        "{REPORT_BRIEF}\nFrom time: {from}\nTo time: {to}\nAlarm name: {alarm_name}\n\
         CloudTrail events: {}\nSlack messages: {}\nCreate the output in markdown format.\n",
        evidence.cloudtrail_events, evidence.slack_messages
    )
}

/// Input of the compose step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeInput {
    /// When the alarm last entered `ALARM`.
    pub last_alarm_time: String,
    /// When the alarm last entered `OK`.
    pub last_ok_time: String,
    /// Alarm name.
    pub metric_alarm_name: String,
    /// Outputs of the evidence lookups.
    #[serde(default)]
    pub parallel_results: Vec<Value>,
}

impl ComposeInput {
    /// The prompt this input produces.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Time`] if either timestamp cannot be parsed.
    pub fn prompt(&self) -> Result<String, BotError> {
        let from = iso_format(parse_timestamp(&self.last_alarm_time)?);
        let to = iso_format(parse_timestamp(&self.last_ok_time)?);
        let evidence = collect_evidence(&self.parallel_results);
        Ok(build_report_prompt(&from, &to, &self.metric_alarm_name, &evidence))
    }
}

/// Output of the compose step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedReport {
    /// Report body.
    pub markdown: String,
}

/// Asks the model to write the incident report.
pub struct ReportCompose {
    model: Arc<dyn ModelClient>,
}

impl ReportCompose {
    /// Create the step.
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    /// Write the report for `input`.
    ///
    /// # Errors
    ///
    /// Timestamp and model failures propagate.
    pub async fn compose(&self, input: &ComposeInput) -> Result<ComposedReport, BotError> {
        let prompt = input.prompt()?;
        let markdown = self
            .model
            .ask(&prompt, InferenceParams::with_max_tokens(REPORT_MAX_TOKENS))
            .await?;
        tracing::info!(alarm = %input.metric_alarm_name, bytes = markdown.len(), "incident report written");
        Ok(ComposedReport { markdown })
    }
}

#[async_trait]
impl Step for ReportCompose {
    async fn run(&self, input: Value) -> Result<Value, BotError> {
        let input: ComposeInput = parse_payload(input)?;
        let report = self.compose(&input).await?;
        Ok(serde_json::to_value(report)?)
    }
}
