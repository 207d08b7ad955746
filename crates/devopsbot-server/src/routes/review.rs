use std::collections::HashMap;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use devopsbot_codereview::handler::WebhookRequest;

use crate::error::AppError;
use crate::state::AppState;

/// POST /review: GitHub pull request webhook.
///
/// The body is taken verbatim so the signature is checked against exactly
/// the bytes GitHub signed.
pub async fn review_webhook(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, AppError> {
    let review = app.review.ok_or_else(|| AppError::not_configured("review"))?;

    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let response = review.handle(&WebhookRequest { headers, body }).await?;

    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::OK);
    Ok((status, Json(response)).into_response())
}
