//! Storing finished reports.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use devopsbot_core::{parse_payload, parse_timestamp, BotError, IncidentReport};
use devopsbot_flow::Step;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content type reports are stored with.
pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Object storage for reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Write `body` under `key`, replacing any existing object.
    async fn put(&self, key: &str, body: &str) -> Result<(), BotError>;
}

/// S3-backed [`ReportStore`].
pub struct S3ReportStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ReportStore {
    /// Create a store writing into `bucket`.
    pub fn new(sdk: &aws_config::SdkConfig, bucket: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(sdk),
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ReportStore for S3ReportStore {
    async fn put(&self, key: &str, body: &str) -> Result<(), BotError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(MARKDOWN_CONTENT_TYPE)
            .body(ByteStream::from(body.as_bytes().to_vec()))
            .send()
            .await
            .map_err(|e| {
                BotError::Cloud(format!(
                    "failed to store s3://{}/{key}: {}",
                    self.bucket,
                    aws_sdk_s3::error::DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistInput {
    last_alarm_time: String,
    metric_alarm_name: String,
    report_result: Value,
}

/// Output of the persist step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistOutcome {
    /// Always `"Success"`.
    pub result: String,
    /// Object key the report was written under.
    pub key: String,
}

/// Report markdown from a compose result, bare or wrapped in `Payload`.
fn report_markdown(result: &Value) -> Option<&str> {
    result
        .pointer("/Payload/markdown")
        .or_else(|| result.get("markdown"))
        .and_then(Value::as_str)
}

/// Writes the composed report to object storage.
pub struct PersistReport {
    store: Arc<dyn ReportStore>,
}

impl PersistReport {
    /// Create the step.
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Store `report` under its derived key.
    ///
    /// Writing the same report twice overwrites the same key.
    ///
    /// # Errors
    ///
    /// Storage failures propagate.
    pub async fn persist(&self, report: &IncidentReport) -> Result<PersistOutcome, BotError> {
        let key = report.object_key();
        self.store.put(&key, &report.markdown).await?;
        tracing::info!(key = %key, "incident report stored");
        Ok(PersistOutcome {
            result: "Success".into(),
            key,
        })
    }
}

#[async_trait]
impl Step for PersistReport {
    async fn run(&self, input: Value) -> Result<Value, BotError> {
        let input: PersistInput = parse_payload(input)?;
        let markdown = report_markdown(&input.report_result)
            .ok_or_else(|| BotError::InvalidPayload("reportResult has no markdown".into()))?;
        let report = IncidentReport {
            alarm_name: input.metric_alarm_name,
            alarm_time: parse_timestamp(&input.last_alarm_time)?,
            markdown: markdown.to_string(),
        };
        let outcome = self.persist(&report).await?;
        Ok(serde_json::to_value(outcome)?)
    }
}
