use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health: liveness plus which automations are wired.
pub async fn health(State(app): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "automations": {
            "review": app.review.is_some(),
            "kanban": app.kanban.is_some(),
            "alarms": app.alarms.is_some(),
            "ingest": app.ingest.is_some(),
            "query": app.query.is_some(),
        }
    }))
}
