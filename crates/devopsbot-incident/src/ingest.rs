//! Re-indexing the knowledge base when a report lands in storage.

use std::sync::Arc;

use async_trait::async_trait;
use devopsbot_core::BotError;
use devopsbot_flow::Step;
use devopsbot_model::knowledge::KnowledgeBase;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Identity of one stored object named by a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIdentity {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Per-write discriminator (sequencer, etag, or version), if present.
    pub revision: Option<String>,
}

/// Objects named by an object-created notification.
///
/// Both the bucket-notification shape (`Records[].s3`) and the event-bus
/// shape (`detail.bucket` / `detail.object`) are understood.
pub fn notified_objects(notification: &Value) -> Vec<ObjectIdentity> {
    let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);

    if let Some(records) = notification.get("Records").and_then(Value::as_array) {
        return records
            .iter()
            .filter_map(|record| {
                let s3 = record.get("s3")?;
                Some(ObjectIdentity {
                    bucket: text(s3.pointer("/bucket/name"))?,
                    key: text(s3.pointer("/object/key"))?,
                    revision: text(s3.pointer("/object/sequencer"))
                        .or_else(|| text(s3.pointer("/object/eTag"))),
                })
            })
            .collect();
    }

    notification
        .get("detail")
        .and_then(|detail| {
            Some(ObjectIdentity {
                bucket: text(detail.pointer("/bucket/name"))?,
                key: text(detail.pointer("/object/key"))?,
                revision: text(detail.pointer("/object/sequencer"))
                    .or_else(|| text(detail.pointer("/object/etag"))),
            })
        })
        .into_iter()
        .collect()
}

/// Idempotency token for the ingestion job a notification starts.
///
/// The token is a digest of the notified object identities, so a redelivered
/// notification maps to the same token and the service ignores the repeat.
/// A notification naming no object gets a fresh random token.
///
/// # Examples
///
/// ```
/// use devopsbot_incident::ingest::ingestion_token;
/// use serde_json::json;
///
/// let event = json!({"Records": [{"s3": {
///     "bucket": {"name": "reports"},
///     "object": {"key": "a.md", "sequencer": "0055AED6DCD90281E5"}
/// }}]});
/// assert_eq!(ingestion_token(&event), ingestion_token(&event.clone()));
/// assert_eq!(ingestion_token(&event).len(), 64);
/// ```
pub fn ingestion_token(notification: &Value) -> String {
    let objects = notified_objects(notification);
    if objects.is_empty() {
        tracing::debug!("notification names no object, using a random ingestion token");
        return uuid::Uuid::new_v4().to_string();
    }

    let mut hasher = Sha256::new();
    for object in &objects {
        hasher.update(object.bucket.as_bytes());
        hasher.update(b"/");
        hasher.update(object.key.as_bytes());
        hasher.update(b"@");
        hasher.update(object.revision.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Starts a knowledge base ingestion job for each object-created notification.
pub struct StartIngestion {
    knowledge_base: Arc<dyn KnowledgeBase>,
}

impl StartIngestion {
    /// Create the step.
    pub fn new(knowledge_base: Arc<dyn KnowledgeBase>) -> Self {
        Self { knowledge_base }
    }
}

#[async_trait]
impl Step for StartIngestion {
    async fn run(&self, input: Value) -> Result<Value, BotError> {
        let token = ingestion_token(&input);
        self.knowledge_base.start_ingestion(&token).await?;
        tracing::info!(token = %token, "knowledge base ingestion started");
        Ok(json!({ "status": "Success" }))
    }
}
