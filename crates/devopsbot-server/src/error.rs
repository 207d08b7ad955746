use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use devopsbot_core::BotError;

/// Sentinel carried through the `anyhow::Error` chain when a route's
/// automation was not wired at startup.
#[derive(Debug)]
struct NotConfiguredError(&'static str);

impl std::fmt::Display for NotConfiguredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} automation is not configured", self.0)
    }
}

impl std::error::Error for NotConfiguredError {}

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// A 503 for a route whose automation is unavailable.
    pub fn not_configured(automation: &'static str) -> Self {
        Self(NotConfiguredError(automation).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<NotConfiguredError>().is_some() {
            StatusCode::SERVICE_UNAVAILABLE
        } else if let Some(e) = self.0.downcast_ref::<BotError>() {
            match e {
                BotError::InvalidPayload(_) | BotError::Time { .. } => StatusCode::BAD_REQUEST,
                BotError::MissingSetting(_) => StatusCode::SERVICE_UNAVAILABLE,
                e if e.is_upstream() => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn invalid_payload_maps_to_400() {
        assert_eq!(
            status_of(BotError::InvalidPayload("no taskKey".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upstream_failures_map_to_502() {
        assert_eq!(status_of(BotError::Tracker("500".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_of(BotError::MalformedCompletion {
                reason: "not json".into(),
                raw: "hello".into(),
            }),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn unconfigured_maps_to_503() {
        assert_eq!(
            AppError::not_configured("kanban").into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(BotError::MissingSetting("MODEL_ID")),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn workflow_errors_map_to_500() {
        assert_eq!(
            status_of(BotError::Workflow("lock poisoned".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
