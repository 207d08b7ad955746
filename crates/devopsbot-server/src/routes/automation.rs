//! Routes that hand a JSON event to a single step.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use devopsbot_flow::Step;
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

/// POST /kanban/events: issue tracker automation notification.
pub async fn kanban_event(
    State(app): State<AppState>,
    Json(event): Json<Value>,
) -> Result<Response, AppError> {
    run(app.kanban, "kanban", event).await
}

/// POST /incident/alarms: alarm state change.
pub async fn alarm_event(
    State(app): State<AppState>,
    Json(event): Json<Value>,
) -> Result<Response, AppError> {
    run(app.alarms, "alarms", event).await
}

/// POST /incident/reports/notify: report object created.
pub async fn report_notification(
    State(app): State<AppState>,
    Json(event): Json<Value>,
) -> Result<Response, AppError> {
    run(app.ingest, "ingest", event).await
}

/// POST /incident/query: playbook request for an alarm.
pub async fn playbook_query(
    State(app): State<AppState>,
    Json(event): Json<Value>,
) -> Result<Response, AppError> {
    run(app.query, "query", event).await
}

async fn run(
    step: Option<Arc<dyn Step>>,
    automation: &'static str,
    event: Value,
) -> Result<Response, AppError> {
    let step = step.ok_or_else(|| AppError::not_configured(automation))?;
    let output = step.run(event).await?;
    Ok((status_of(&output), Json(output)).into_response())
}

/// The HTTP status a step output asks for through its `statusCode`.
fn status_of(output: &Value) -> StatusCode {
    output
        .get("statusCode")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK)
}
