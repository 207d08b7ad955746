//! The pull request webhook receiver.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use devopsbot_core::{parse_payload, to_payload, BotError, PullRequestRef};
use devopsbot_flow::Step;
use devopsbot_model::client::ModelClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::github::SourceControl;
use crate::prompt::{build_review_prompt, review_params};
use crate::signature::{self, SIGNATURE_HEADER};

/// An inbound webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookRequest {
    /// Request headers as delivered; names may use any case.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Raw request body, exactly as signed.
    #[serde(default)]
    pub body: String,
}

impl WebhookRequest {
    /// Case-insensitive header lookup.
    ///
    /// # Examples
    ///
    /// ```
    /// use devopsbot_codereview::handler::WebhookRequest;
    ///
    /// let mut request = WebhookRequest::default();
    /// request.headers.insert("x-hub-signature-256".into(), "sha256=00".into());
    /// assert_eq!(request.header("X-Hub-Signature-256"), Some("sha256=00"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The webhook response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Plain-text body.
    pub body: String,
}

impl WebhookResponse {
    fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }
}

#[derive(Deserialize)]
struct PullRequestEvent {
    pull_request: PullRequestFields,
    repository: RepositoryFields,
}

#[derive(Deserialize)]
struct PullRequestFields {
    number: u64,
}

#[derive(Deserialize)]
struct RepositoryFields {
    full_name: String,
}

/// Reviews a pull request for each signed webhook delivery.
pub struct CodeReview {
    source: Arc<dyn SourceControl>,
    model: Arc<dyn ModelClient>,
    secret: String,
}

impl CodeReview {
    /// Create the handler with the shared webhook `secret`.
    pub fn new(
        source: Arc<dyn SourceControl>,
        model: Arc<dyn ModelClient>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            source,
            model,
            secret: secret.into(),
        }
    }

    /// Handle one delivery.
    ///
    /// Authentication and shape problems are answered with a response
    /// (403 or 400); deliveries that are not pull request events are
    /// acknowledged with 200 and nothing else happens.
    ///
    /// # Errors
    ///
    /// Failures fetching the diff, calling the model, or posting the
    /// comment propagate.
    pub async fn handle(&self, request: &WebhookRequest) -> Result<WebhookResponse, BotError> {
        let Some(header) = request.header(SIGNATURE_HEADER) else {
            tracing::warn!("webhook delivery without signature");
            return Ok(WebhookResponse::new(403, "Missing signature"));
        };
        if !signature::verify(self.secret.as_bytes(), request.body.as_bytes(), header) {
            tracing::warn!("webhook signature mismatch");
            return Ok(WebhookResponse::new(403, "Signature mismatch"));
        }

        let payload: Value = match serde_json::from_str(&request.body) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "webhook body is not JSON");
                return Ok(WebhookResponse::new(400, "Invalid JSON payload"));
            }
        };
        if payload.get("pull_request").map_or(true, is_empty_value) {
            tracing::debug!("not a pull request event, ignoring");
            return Ok(WebhookResponse::new(200, "Ignored: not a pull request event"));
        }
        let event: PullRequestEvent = match serde_json::from_value(payload) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "pull request event is missing fields");
                return Ok(WebhookResponse::new(400, "Invalid pull request event"));
            }
        };

        let pr = PullRequestRef {
            repository: event.repository.full_name,
            number: event.pull_request.number,
        };
        self.review(&pr).await?;
        Ok(WebhookResponse::new(200, "Successfully Completed"))
    }

    /// Review `pr` and post the result as a comment.
    ///
    /// # Errors
    ///
    /// Source control and model failures propagate.
    pub async fn review(&self, pr: &PullRequestRef) -> Result<String, BotError> {
        tracing::info!(pr = %pr, "reviewing pull request");
        let diff = self.source.fetch_diff(pr).await?;
        tracing::debug!(pr = %pr, bytes = diff.len(), "diff fetched");

        let feedback = self
            .model
            .ask(&build_review_prompt(&diff), review_params())
            .await?;
        self.source.post_comment(pr, &feedback).await?;
        Ok(feedback)
    }
}

/// Whether `value` is null, false, zero, or empty.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

#[async_trait]
impl Step for CodeReview {
    async fn run(&self, input: Value) -> Result<Value, BotError> {
        let request: WebhookRequest = parse_payload(input)?;
        let response = self.handle(&request).await?;
        to_payload(&response)
    }
}
