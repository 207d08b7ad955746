use async_trait::async_trait;
use aws_sdk_cloudtrail::primitives::DateTime as AwsDateTime;
use chrono::{DateTime, Utc};
use devopsbot_core::{evidence_time, BotError, TimeWindow};
use serde::{Deserialize, Serialize};

/// Upper bound on audit events returned per lookup.
pub const MAX_LOOKUP_RESULTS: i32 = 100;

/// A management event recorded by the audit trail.
///
/// Serialized with the field names the CloudTrail API uses so that the
/// evidence handed to the model reads like the service's own output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuditEvent {
    /// Event id.
    pub event_id: Option<String>,
    /// API action, e.g. `TerminateInstances`.
    pub event_name: Option<String>,
    /// `"true"` for read-only calls.
    pub read_only: Option<String>,
    /// Access key used for the call.
    pub access_key_id: Option<String>,
    /// When the call was made, RFC 3339.
    pub event_time: Option<String>,
    /// Service that received the call.
    pub event_source: Option<String>,
    /// Caller.
    pub username: Option<String>,
    /// Resources the call referenced.
    #[serde(default)]
    pub resources: Vec<AuditResource>,
    /// Full event record as JSON text.
    pub cloud_trail_event: Option<String>,
}

/// A resource referenced by an [`AuditEvent`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuditResource {
    /// Resource type, e.g. `AWS::EC2::Instance`.
    pub resource_type: Option<String>,
    /// Resource name or id.
    pub resource_name: Option<String>,
}

/// Source of audit events.
#[async_trait]
pub trait AuditTrail: Send + Sync {
    /// Events recorded inside `window`, at most [`MAX_LOOKUP_RESULTS`].
    async fn lookup(&self, window: TimeWindow) -> Result<Vec<AuditEvent>, BotError>;
}

/// CloudTrail-backed [`AuditTrail`].
pub struct CloudTrailClient {
    client: aws_sdk_cloudtrail::Client,
}

impl CloudTrailClient {
    /// Create a client from shared SDK configuration.
    pub fn new(sdk: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudtrail::Client::new(sdk),
        }
    }
}

fn to_aws(at: DateTime<Utc>) -> AwsDateTime {
    AwsDateTime::from_secs_and_nanos(at.timestamp(), at.timestamp_subsec_nanos())
}

fn from_aws(at: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(at.secs(), at.subsec_nanos())
}

#[async_trait]
impl AuditTrail for CloudTrailClient {
    async fn lookup(&self, window: TimeWindow) -> Result<Vec<AuditEvent>, BotError> {
        let output = self
            .client
            .lookup_events()
            .start_time(to_aws(window.start))
            .end_time(to_aws(window.end))
            .max_results(MAX_LOOKUP_RESULTS)
            .send()
            .await
            .map_err(|e| {
                BotError::Cloud(format!(
                    "failed to look up audit events: {}",
                    aws_sdk_cloudtrail::error::DisplayErrorContext(&e)
                ))
            })?;

        let events = output
            .events()
            .iter()
            .map(|event| AuditEvent {
                event_id: event.event_id().map(str::to_string),
                event_name: event.event_name().map(str::to_string),
                read_only: event.read_only().map(str::to_string),
                access_key_id: event.access_key_id().map(str::to_string),
                event_time: event.event_time().and_then(from_aws).map(evidence_time),
                event_source: event.event_source().map(str::to_string),
                username: event.username().map(str::to_string),
                resources: event
                    .resources()
                    .iter()
                    .map(|r| AuditResource {
                        resource_type: r.resource_type().map(str::to_string),
                        resource_name: r.resource_name().map(str::to_string),
                    })
                    .collect(),
                cloud_trail_event: event.cloud_trail_event().map(str::to_string),
            })
            .collect::<Vec<_>>();

        tracing::debug!(count = events.len(), "audit events found");
        Ok(events)
    }
}
